//! Program Loader
//!
//! Builds a fresh address space from an ELF32 executable and pushes the
//! initial argument stack.
//!
//! # Loading Process
//! 1. Open the executable and deny writes to it
//! 2. Read and validate the ELF header
//! 3. Walk the program headers, mapping every `PT_LOAD` segment
//! 4. Map a stack page and push `argc`/`argv`
//!
//! # Security Properties
//! - Images needing dynamic linking are rejected
//! - Segments may not touch page 0 or kernel memory
//! - Every frame is zeroed past the file-backed bytes
//! - Any failure drops the partial address space, returning all frames
//!
//! Callers must hold the filesystem lock for the whole load.

pub mod elf;
pub mod stack;

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;

use crate::fs::{File, FileSystem};
use crate::mm::{AddressSpace, FrameAllocator, MappingError, VirtAddr, PAGE_SIZE};
use elf::{ElfError, ElfHeader, ProgramHeader, SegmentLayout, SegmentType, EHDR_SIZE, PHDR_SIZE};

/// Reasons a program could not be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    /// The executable could not be opened.
    OpenFailed,
    /// The ELF header is missing or malformed.
    BadHeader(ElfError),
    /// A program header is malformed or unsupported.
    BadSegment(ElfError),
    /// The file ended inside a segment.
    ShortRead,
    /// A page could not be allocated or mapped.
    Mapping(MappingError),
    /// The arguments do not fit in the stack page.
    StackOverflow,
}

impl LoadError {
    /// Text of the console diagnostic for this failure, if it has one.
    pub fn diagnostic(&self) -> Option<&'static str> {
        match self {
            Self::OpenFailed => Some("open failed"),
            Self::BadHeader(_) => Some("error loading executable"),
            _ => None,
        }
    }
}

impl From<MappingError> for LoadError {
    fn from(e: MappingError) -> Self {
        Self::Mapping(e)
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OpenFailed => write!(f, "open failed"),
            Self::BadHeader(e) => write!(f, "bad ELF header: {}", e),
            Self::BadSegment(e) => write!(f, "bad program header: {}", e),
            Self::ShortRead => write!(f, "short read in segment"),
            Self::Mapping(e) => write!(f, "mapping failed: {}", e),
            Self::StackOverflow => write!(f, "arguments overflow the stack page"),
        }
    }
}

/// A successfully loaded program, ready to run.
pub struct LoadedImage {
    /// Address space holding the image and its stack.
    pub address_space: AddressSpace,
    /// Entry point from the ELF header.
    pub entry: VirtAddr,
    /// Initial user stack pointer.
    pub stack_pointer: VirtAddr,
    /// The executable, write-denied for as long as it is held.
    pub executable: Box<dyn File>,
}

impl fmt::Debug for LoadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedImage")
            .field("address_space", &self.address_space)
            .field("entry", &self.entry)
            .field("stack_pointer", &self.stack_pointer)
            .finish_non_exhaustive()
    }
}

/// Load `argv[0]` from `fs` and push `argv` onto its stack.
///
/// `argv` must hold at least the program name.
pub fn load(
    fs: &dyn FileSystem,
    frames: Arc<dyn FrameAllocator>,
    argv: &[&str],
) -> Result<LoadedImage, LoadError> {
    let name = argv.first().copied().ok_or(LoadError::OpenFailed)?;
    let mut file = fs.open(name).ok_or(LoadError::OpenFailed)?;
    file.deny_write();

    match load_image(&mut *file, frames, argv) {
        Ok((address_space, entry, stack_pointer)) => {
            log::debug!(
                "[LOADER] {}: entry {}, {} pages, esp {}",
                name,
                entry,
                address_space.mapped_pages(),
                stack_pointer
            );
            Ok(LoadedImage {
                address_space,
                entry,
                stack_pointer,
                executable: file,
            })
        }
        Err(e) => {
            log::debug!("[LOADER] {}: {}", name, e);
            file.allow_write();
            Err(e)
        }
    }
}

fn load_image(
    file: &mut dyn File,
    frames: Arc<dyn FrameAllocator>,
    argv: &[&str],
) -> Result<(AddressSpace, VirtAddr, VirtAddr), LoadError> {
    let mut space = AddressSpace::new(frames);

    let mut ehdr = [0u8; EHDR_SIZE];
    if file.read(&mut ehdr) != EHDR_SIZE {
        return Err(LoadError::BadHeader(ElfError::TooSmall));
    }
    let header = ElfHeader::parse(&ehdr).map_err(LoadError::BadHeader)?;

    let file_len = file.length();
    let mut offset = header.phoff;
    for _ in 0..header.phnum {
        if offset > file_len {
            return Err(LoadError::BadSegment(ElfError::InvalidPhoff));
        }
        file.seek(offset);
        let mut raw = [0u8; PHDR_SIZE];
        if file.read(&mut raw) != PHDR_SIZE {
            return Err(LoadError::BadSegment(ElfError::TruncatedPhdr));
        }
        offset = offset
            .checked_add(PHDR_SIZE as u32)
            .ok_or(LoadError::BadSegment(ElfError::InvalidPhoff))?;

        let phdr = ProgramHeader::parse(&raw).map_err(LoadError::BadSegment)?;
        match phdr.kind {
            SegmentType::Dynamic | SegmentType::Interp | SegmentType::Shlib => {
                return Err(LoadError::BadSegment(ElfError::UnsupportedSegment(phdr.kind)));
            }
            SegmentType::Load => {
                phdr.validate(file_len).map_err(LoadError::BadSegment)?;
                load_segment(file, &mut space, phdr.layout())?;
            }
            _ => {}
        }
    }

    let entry = VirtAddr::new(header.entry as usize);
    let stack_pointer = stack::build(&mut space, argv)?;
    Ok((space, entry, stack_pointer))
}

/// Map one segment page by page, reading its file-backed part.
fn load_segment(
    file: &mut dyn File,
    space: &mut AddressSpace,
    layout: SegmentLayout,
) -> Result<(), LoadError> {
    file.seek(layout.file_page);
    let mut read_bytes = layout.read_bytes;
    let mut upage = layout.mem_page;

    for _ in 0..layout.pages() {
        let page_read = read_bytes.min(PAGE_SIZE);
        let mut frame = space.allocate_frame()?;
        let bytes = frame.as_bytes_mut();
        if file.read(&mut bytes[..page_read]) != page_read {
            space.free_frame(frame);
            return Err(LoadError::ShortRead);
        }
        bytes[page_read..].fill(0);

        space.map(upage, frame, layout.writable)?;
        read_bytes -= page_read;
        upage = VirtAddr::new(upage.as_usize() + PAGE_SIZE);
    }
    Ok(())
}
