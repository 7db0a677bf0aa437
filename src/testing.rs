//! Host test doubles.
//!
//! Threads are std threads, the filesystem lives in memory, and "user
//! programs" are Rust closures that drive the real system call path by
//! writing call words onto their own user stack and trapping into
//! [`Kernel::syscall`].

use std::alloc::{alloc_zeroed, Layout};
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{JoinHandle, Thread};

use crate::drivers::Console;
use crate::fs::{File, FileSystem};
use crate::kernel::{Kernel, KernelConfig, Platform};
use crate::mm::{FrameAllocator, PhysAddr, PhysFrame, UserPool, VirtAddr, PAGE_SIZE, USER_TOP};
use crate::process::{ExecError, ProcessSlot};
use crate::sched::{IntrLevel, Scheduler, Shutdown, SpawnError, ThreadEntry, Tid};
use crate::syscall::validate::{copy_in_string, read_u32};
use crate::syscall::SyscallNumber;
use crate::trap::{FaultInfo, FaultMode, TrapFrame, UserContext};

// ---------------------------------------------------------------------------
// Frames

/// A pool of `frames` page frames over leaked host memory.
pub fn user_pool(frames: usize) -> UserPool {
    let size = frames * PAGE_SIZE;
    let layout = Layout::from_size_align(size, PAGE_SIZE).unwrap();
    // SAFETY: layout has non-zero size.
    let start = unsafe { alloc_zeroed(layout) };
    assert!(!start.is_null(), "host allocation failed");
    // SAFETY: the region is fresh, exclusively ours, and never freed.
    unsafe { UserPool::new(start, size) }
}

/// [`user_pool`] behind an `Arc`, ready to back address spaces.
pub fn shared_pool(frames: usize) -> Arc<UserPool> {
    Arc::new(user_pool(frames))
}

/// Frame allocator that notes frees made with interrupts disabled.
pub struct WatchedFrames {
    pool: Arc<UserPool>,
    freed_with_interrupts_off: AtomicUsize,
}

impl WatchedFrames {
    pub fn new(pool: Arc<UserPool>) -> Self {
        Self {
            pool,
            freed_with_interrupts_off: AtomicUsize::new(0),
        }
    }

    pub fn freed_with_interrupts_off(&self) -> usize {
        self.freed_with_interrupts_off.load(Ordering::SeqCst)
    }
}

impl FrameAllocator for WatchedFrames {
    fn allocate(&self) -> Option<PhysFrame> {
        self.pool.allocate()
    }

    fn deallocate(&self, frame: PhysFrame) {
        if INTR.with(Cell::get) == IntrLevel::Off {
            self.freed_with_interrupts_off.fetch_add(1, Ordering::SeqCst);
        }
        self.pool.deallocate(frame);
    }
}

// ---------------------------------------------------------------------------
// Scheduler

/// Unwind payload used to end a thread.
pub struct ThreadExit;

/// Body of a scripted user program.
pub type Program = Arc<dyn Fn(&mut UserEnv) + Send + Sync>;

type ActivationLog = Arc<Mutex<Vec<(Tid, Option<PhysAddr>)>>>;

thread_local! {
    static CURRENT: Cell<Tid> = const { Cell::new(Tid(1)) };
    static INTR: Cell<IntrLevel> = const { Cell::new(IntrLevel::On) };
}

/// Scheduler running every kernel thread on its own std thread.
pub struct TestScheduler {
    next_tid: AtomicI32,
    handles: Mutex<Vec<JoinHandle<()>>>,
    failures: Arc<Mutex<Vec<String>>>,
    activations: ActivationLog,
    kernel: Mutex<Weak<Kernel>>,
    programs: Mutex<HashMap<String, Program>>,
    threads: Arc<Mutex<HashMap<Tid, Thread>>>,
    blocks: AtomicUsize,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self {
            next_tid: AtomicI32::new(2),
            handles: Mutex::new(Vec::new()),
            failures: Arc::new(Mutex::new(Vec::new())),
            activations: Arc::new(Mutex::new(Vec::new())),
            kernel: Mutex::new(Weak::new()),
            programs: Mutex::new(HashMap::new()),
            threads: Arc::new(Mutex::new(HashMap::new())),
            blocks: AtomicUsize::new(0),
        }
    }

    /// Give the calling (non-spawned) thread a tid of its own.
    pub fn adopt_current_thread(&self) -> Tid {
        let tid = Tid(self.next_tid.fetch_add(1, Ordering::SeqCst));
        CURRENT.with(|c| c.set(tid));
        self.threads
            .lock()
            .unwrap()
            .insert(tid, std::thread::current());
        tid
    }

    /// Number of times any thread went to sleep in `block`.
    pub fn blocks(&self) -> usize {
        self.blocks.load(Ordering::SeqCst)
    }

    /// Kernel whose `syscall` user programs trap into.
    pub fn attach(&self, kernel: &Arc<Kernel>) {
        *self.kernel.lock().unwrap() = Arc::downgrade(kernel);
    }

    /// Run `program` whenever a process named `name` enters user mode.
    pub fn register(&self, name: &str, program: Program) {
        self.programs.lock().unwrap().insert(name.to_string(), program);
    }

    /// Interrupt level of the calling thread.
    pub fn intr_level(&self) -> IntrLevel {
        INTR.with(Cell::get)
    }

    /// Every address-space activation so far.
    pub fn activations(&self) -> Vec<(Tid, Option<PhysAddr>)> {
        self.activations.lock().unwrap().clone()
    }

    /// Wait for every spawned thread, then fail if any of them panicked.
    pub fn join_all(&self) {
        loop {
            let handle = self.handles.lock().unwrap().pop();
            match handle {
                Some(handle) => {
                    let _ = handle.join();
                }
                None => break,
            }
        }
        let failures = self.failures.lock().unwrap();
        assert!(failures.is_empty(), "thread failures: {:?}", *failures);
    }
}

fn describe(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic".to_string()
    }
}

impl Scheduler for TestScheduler {
    fn spawn(&self, name: &str, _priority: u8, entry: ThreadEntry) -> Result<Tid, SpawnError> {
        let tid = Tid(self.next_tid.fetch_add(1, Ordering::SeqCst));
        let failures = Arc::clone(&self.failures);
        let threads = Arc::clone(&self.threads);
        let handle = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                CURRENT.with(|c| c.set(tid));
                threads
                    .lock()
                    .unwrap()
                    .insert(tid, std::thread::current());
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(entry)) {
                    if !payload.is::<ThreadExit>() {
                        failures.lock().unwrap().push(describe(&*payload));
                    }
                }
            })
            .map_err(|_| SpawnError::OutOfMemory)?;
        self.handles.lock().unwrap().push(handle);
        Ok(tid)
    }

    fn current(&self) -> Tid {
        let tid = CURRENT.with(Cell::get);
        self.threads
            .lock()
            .unwrap()
            .entry(tid)
            .or_insert_with(std::thread::current);
        tid
    }

    fn block(&self) {
        self.blocks.fetch_add(1, Ordering::SeqCst);
        std::thread::park();
    }

    fn unblock(&self, tid: Tid) {
        if let Some(thread) = self.threads.lock().unwrap().get(&tid) {
            thread.unpark();
        }
    }

    fn exit_thread(&self) -> ! {
        panic::resume_unwind(Box::new(ThreadExit))
    }

    fn activate_address_space(&self, root: Option<PhysAddr>) {
        self.activations
            .lock()
            .unwrap()
            .push((self.current(), root));
    }

    fn enter_user(&self, slot: ProcessSlot, context: UserContext) -> ! {
        let kernel = self
            .kernel
            .lock()
            .unwrap()
            .upgrade()
            .expect("scheduler not attached to a kernel");
        let name = slot.get().map(|p| p.name().to_string()).unwrap_or_default();
        let program = self.programs.lock().unwrap().get(&name).cloned();

        let mut env = UserEnv {
            kernel,
            slot,
            context,
            scratch: 0,
            activations: Arc::clone(&self.activations),
        };
        if let Some(program) = program {
            program(&mut env);
        }
        // Returning from main exits with status 0.
        env.exit(0)
    }

    fn intr_disable(&self) -> IntrLevel {
        INTR.with(|level| level.replace(IntrLevel::Off))
    }

    fn intr_set_level(&self, level: IntrLevel) {
        INTR.with(|l| l.set(level));
    }
}

// ---------------------------------------------------------------------------
// User programs

/// Base of the text segment of every installed program.
pub const CODE_BASE: u32 = 0x0804_8000;
/// Base of the data segment of every installed program.
pub const DATA_BASE: u32 = 0x0804_A000;

const STACK_BASE: usize = USER_TOP - PAGE_SIZE;

/// What a scripted user program can do.
pub struct UserEnv {
    kernel: Arc<Kernel>,
    slot: ProcessSlot,
    context: UserContext,
    /// Bytes of the stack page's low end handed out by `push_bytes`.
    scratch: usize,
    activations: ActivationLog,
}

impl UserEnv {
    /// Own pid.
    pub fn pid(&self) -> i32 {
        self.slot.get().map_or(-1, |p| p.pid().0)
    }

    /// Arguments as laid out on the initial stack.
    pub fn args(&self) -> Vec<String> {
        let space = self.slot.get().and_then(|p| p.address_space()).unwrap();
        let esp = self.context.esp as usize;
        let argc = read_u32(space, VirtAddr::new(esp + 4)).unwrap();
        let argv = read_u32(space, VirtAddr::new(esp + 8)).unwrap() as usize;
        (0..argc as usize)
            .map(|i| {
                let ptr = read_u32(space, VirtAddr::new(argv + 4 * i)).unwrap();
                let bytes = copy_in_string(space, VirtAddr::new(ptr as usize), PAGE_SIZE).unwrap();
                String::from_utf8(bytes).unwrap()
            })
            .collect()
    }

    /// Copy `bytes` into spare stack memory and return their address.
    pub fn push_bytes(&mut self, bytes: &[u8]) -> u32 {
        let addr = STACK_BASE + self.scratch;
        self.scratch += bytes.len();
        self.space_mut()
            .write_bytes(VirtAddr::new(addr), bytes)
            .unwrap();
        addr as u32
    }

    /// Copy a NUL-terminated `s` into spare stack memory.
    pub fn push_str(&mut self, s: &str) -> u32 {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.push_bytes(&bytes)
    }

    /// Read user memory.
    pub fn read_user(&self, addr: u32, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        self.slot
            .get()
            .and_then(|p| p.address_space())
            .unwrap()
            .read_bytes(VirtAddr::new(addr as usize), &mut buf)
            .unwrap();
        buf
    }

    fn space_mut(&mut self) -> &mut crate::mm::AddressSpace {
        self.slot
            .get_mut()
            .and_then(|p| p.address_space.as_mut())
            .unwrap()
    }

    /// Push `number` and `args` below the stack pointer and trap.
    pub fn syscall(&mut self, number: u32, args: &[u32]) -> i32 {
        let esp = self.context.esp as usize - 64;
        let words: Vec<u8> = core::iter::once(number)
            .chain(args.iter().copied())
            .flat_map(u32::to_le_bytes)
            .collect();
        self.space_mut()
            .write_bytes(VirtAddr::new(esp), &words)
            .unwrap();
        self.trap_at(esp as u32)
    }

    /// Trap with an arbitrary stack pointer.
    pub fn trap_at(&mut self, esp: u32) -> i32 {
        let mut frame = TrapFrame::new(esp);
        self.kernel.syscall(&mut self.slot, &mut frame);
        frame.eax as i32
    }

    /// Touch an address the process cannot access.
    pub fn page_fault(&mut self, addr: u32) -> ! {
        self.kernel.user_fault(
            &mut self.slot,
            FaultInfo {
                address: VirtAddr::new(addr as usize),
                mode: FaultMode::User,
                write: false,
                present: false,
            },
        )
    }

    /// Root of this process's page tables.
    pub fn address_space_root(&self) -> PhysAddr {
        self.slot
            .get()
            .and_then(|p| p.address_space())
            .map(|s| s.root())
            .unwrap()
    }

    /// Most recent activation made on this thread.
    pub fn last_activation(&self) -> Option<Option<PhysAddr>> {
        let me = CURRENT.with(Cell::get);
        self.activations
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(tid, _)| *tid == me)
            .map(|(_, root)| *root)
    }

    pub fn exit(&mut self, status: i32) -> ! {
        self.syscall(SyscallNumber::Exit as u32, &[status as u32]);
        unreachable!("exit returned")
    }

    pub fn exec(&mut self, cmd_line: u32) -> i32 {
        self.syscall(SyscallNumber::Exec as u32, &[cmd_line])
    }

    pub fn wait(&mut self, pid: i32) -> i32 {
        self.syscall(SyscallNumber::Wait as u32, &[pid as u32])
    }

    pub fn create(&mut self, path: u32, size: u32) -> i32 {
        self.syscall(SyscallNumber::Create as u32, &[path, size])
    }

    pub fn remove(&mut self, path: u32) -> i32 {
        self.syscall(SyscallNumber::Remove as u32, &[path])
    }

    pub fn open(&mut self, path: u32) -> i32 {
        self.syscall(SyscallNumber::Open as u32, &[path])
    }

    pub fn filesize(&mut self, fd: i32) -> i32 {
        self.syscall(SyscallNumber::Filesize as u32, &[fd as u32])
    }

    pub fn read(&mut self, fd: i32, buf: u32, size: u32) -> i32 {
        self.syscall(SyscallNumber::Read as u32, &[fd as u32, buf, size])
    }

    pub fn write(&mut self, fd: i32, buf: u32, size: u32) -> i32 {
        self.syscall(SyscallNumber::Write as u32, &[fd as u32, buf, size])
    }

    pub fn seek(&mut self, fd: i32, position: u32) {
        self.syscall(SyscallNumber::Seek as u32, &[fd as u32, position]);
    }

    pub fn tell(&mut self, fd: i32) -> i32 {
        self.syscall(SyscallNumber::Tell as u32, &[fd as u32])
    }

    pub fn close(&mut self, fd: i32) {
        self.syscall(SyscallNumber::Close as u32, &[fd as u32]);
    }
}

// ---------------------------------------------------------------------------
// Devices

/// Console with scripted keyboard input that records all output.
pub struct RecordingConsole {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
    writes: AtomicUsize,
}

impl RecordingConsole {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: Mutex::new(input.iter().copied().collect()),
            output: Mutex::new(Vec::new()),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.output.lock().unwrap()).into_owned()
    }

    /// Number of `putbuf` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Console for RecordingConsole {
    fn getc(&self) -> u8 {
        self.input.lock().unwrap().pop_front().unwrap_or(0)
    }

    fn putbuf(&self, buf: &[u8]) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.output.lock().unwrap().extend_from_slice(buf);
    }
}

/// Power switch that ends the calling thread.
#[derive(Default)]
pub struct TestPower {
    halted: AtomicBool,
}

impl TestPower {
    pub fn halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

impl Shutdown for TestPower {
    fn power_off(&self) -> ! {
        self.halted.store(true, Ordering::SeqCst);
        panic::resume_unwind(Box::new(ThreadExit))
    }
}

// ---------------------------------------------------------------------------
// Filesystem

struct Inode {
    data: Vec<u8>,
    deny_write: usize,
}

/// Flat in-memory filesystem.
#[derive(Default)]
pub struct MemFs {
    files: Mutex<HashMap<String, Arc<Mutex<Inode>>>>,
    open: Arc<AtomicUsize>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, name: &str, data: &[u8]) {
        self.files.lock().unwrap().insert(
            name.to_string(),
            Arc::new(Mutex::new(Inode {
                data: data.to_vec(),
                deny_write: 0,
            })),
        );
    }

    /// Number of handles not yet closed.
    pub fn open_handles(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

impl FileSystem for MemFs {
    fn open(&self, path: &str) -> Option<Box<dyn File>> {
        let inode = self.files.lock().unwrap().get(path).cloned()?;
        self.open.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(MemFile {
            inode,
            pos: 0,
            denied: false,
            open: Arc::clone(&self.open),
        }))
    }

    fn create(&self, path: &str, initial_size: u32) -> bool {
        let mut files = self.files.lock().unwrap();
        if files.contains_key(path) {
            return false;
        }
        files.insert(
            path.to_string(),
            Arc::new(Mutex::new(Inode {
                data: vec![0; initial_size as usize],
                deny_write: 0,
            })),
        );
        true
    }

    fn remove(&self, path: &str) -> bool {
        self.files.lock().unwrap().remove(path).is_some()
    }
}

struct MemFile {
    inode: Arc<Mutex<Inode>>,
    pos: u32,
    denied: bool,
    open: Arc<AtomicUsize>,
}

impl File for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let inode = self.inode.lock().unwrap();
        let start = (self.pos as usize).min(inode.data.len());
        let n = buf.len().min(inode.data.len() - start);
        buf[..n].copy_from_slice(&inode.data[start..start + n]);
        self.pos += n as u32;
        n
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        let mut inode = self.inode.lock().unwrap();
        if inode.deny_write > 0 {
            return 0;
        }
        let start = self.pos as usize;
        if inode.data.len() < start + buf.len() {
            inode.data.resize(start + buf.len(), 0);
        }
        inode.data[start..start + buf.len()].copy_from_slice(buf);
        self.pos += buf.len() as u32;
        buf.len()
    }

    fn seek(&mut self, position: u32) {
        self.pos = position;
    }

    fn tell(&self) -> u32 {
        self.pos
    }

    fn length(&self) -> u32 {
        self.inode.lock().unwrap().data.len() as u32
    }

    fn deny_write(&mut self) {
        if !self.denied {
            self.denied = true;
            self.inode.lock().unwrap().deny_write += 1;
        }
    }

    fn allow_write(&mut self) {
        if self.denied {
            self.denied = false;
            self.inode.lock().unwrap().deny_write -= 1;
        }
    }
}

impl Drop for MemFile {
    fn drop(&mut self) {
        self.allow_write();
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// ELF images

struct Segment {
    kind: u32,
    vaddr: u32,
    data: Vec<u8>,
    memsz: u32,
    flags: u32,
}

/// Builds minimal i386 ELF executables.
pub struct ElfBuilder {
    entry: u32,
    segments: Vec<Segment>,
}

impl ElfBuilder {
    pub fn new(entry: u32) -> Self {
        Self {
            entry,
            segments: Vec::new(),
        }
    }

    /// Add a `PT_LOAD` segment.
    pub fn segment(mut self, vaddr: u32, data: &[u8], memsz: u32, writable: bool) -> Self {
        self.segments.push(Segment {
            kind: 1,
            vaddr,
            data: data.to_vec(),
            memsz,
            flags: if writable { 4 | 2 } else { 4 | 1 },
        });
        self
    }

    /// Add a data-less program header of type `kind`.
    pub fn program_header(mut self, kind: u32, vaddr: u32) -> Self {
        self.segments.push(Segment {
            kind,
            vaddr,
            data: Vec::new(),
            memsz: 0,
            flags: 4,
        });
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let table_end = 52 + 32 * self.segments.len();
        let mut cursor = round_up(table_end);
        let mut image = vec![0u8; cursor];

        image[..7].copy_from_slice(&[0x7F, b'E', b'L', b'F', 1, 1, 1]);
        put16(&mut image, 16, 2); // ET_EXEC
        put16(&mut image, 18, 3); // EM_386
        put32(&mut image, 20, 1);
        put32(&mut image, 24, self.entry);
        put32(&mut image, 28, 52);
        put16(&mut image, 40, 52);
        put16(&mut image, 42, 32);
        put16(&mut image, 44, self.segments.len() as u16);

        for (i, seg) in self.segments.iter().enumerate() {
            let page_offset = seg.vaddr as usize & (PAGE_SIZE - 1);
            let offset = if seg.data.is_empty() {
                page_offset
            } else {
                let offset = cursor + page_offset;
                if image.len() < offset + seg.data.len() {
                    image.resize(offset + seg.data.len(), 0);
                }
                image[offset..offset + seg.data.len()].copy_from_slice(&seg.data);
                cursor = round_up(offset + seg.data.len());
                offset
            };

            let ph = 52 + 32 * i;
            put32(&mut image, ph, seg.kind);
            put32(&mut image, ph + 4, offset as u32);
            put32(&mut image, ph + 8, seg.vaddr);
            put32(&mut image, ph + 12, seg.vaddr);
            put32(&mut image, ph + 16, seg.data.len() as u32);
            put32(&mut image, ph + 20, seg.memsz);
            put32(&mut image, ph + 24, seg.flags);
            put32(&mut image, ph + 28, PAGE_SIZE as u32);
        }
        image
    }
}

fn round_up(n: usize) -> usize {
    (n + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

fn put16(image: &mut [u8], at: usize, value: u16) {
    image[at..at + 2].copy_from_slice(&value.to_le_bytes());
}

fn put32(image: &mut [u8], at: usize, value: u32) {
    image[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

// ---------------------------------------------------------------------------
// Whole-kernel harness

/// A kernel wired to host doubles.
pub struct Harness {
    pub kernel: Arc<Kernel>,
    pub scheduler: Arc<TestScheduler>,
    pub fs: Arc<MemFs>,
    pub console: Arc<RecordingConsole>,
    pub pool: Arc<UserPool>,
    pub frames: Arc<WatchedFrames>,
    pub power: Arc<TestPower>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_input(b"")
    }

    pub fn with_input(input: &[u8]) -> Self {
        let scheduler = Arc::new(TestScheduler::new());
        let fs = Arc::new(MemFs::new());
        let console = Arc::new(RecordingConsole::new(input));
        let pool = shared_pool(64);
        let frames = Arc::new(WatchedFrames::new(pool.clone()));
        let power = Arc::new(TestPower::default());

        let kernel = Kernel::new(
            Platform {
                fs: fs.clone(),
                scheduler: scheduler.clone(),
                console: console.clone(),
                frames: frames.clone(),
                power: power.clone(),
            },
            KernelConfig::default(),
        );
        scheduler.attach(&kernel);

        Self {
            kernel,
            scheduler,
            fs,
            console,
            pool,
            frames,
            power,
        }
    }

    /// Put an executable called `name` on disk that runs `program`.
    pub fn install<F>(&self, name: &str, program: F)
    where
        F: Fn(&mut UserEnv) + Send + Sync + 'static,
    {
        let image = ElfBuilder::new(CODE_BASE)
            .segment(CODE_BASE, b"\xcd\x30\xeb\xfe", 0x100, false)
            .segment(DATA_BASE, b"initialized", 0x200, true)
            .build();
        self.fs.add_file(name, &image);
        self.scheduler.register(name, Arc::new(program));
    }

    /// Boot `cmd_line` as the initial process and wait for it.
    pub fn run(&self, cmd_line: &str) -> Result<i32, ExecError> {
        self.kernel.run(cmd_line)
    }

    /// Wait for every process thread to finish.
    pub fn finish(&self) {
        self.scheduler.join_all();
    }
}
