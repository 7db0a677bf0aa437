//! ELF32 Parser
//!
//! Decodes and validates the i386 executable header and program headers.
//! All fields are read little-endian from byte arrays; nothing is cast in
//! place, so a truncated or hostile image can only produce an [`ElfError`].

use bitflags::bitflags;
use core::fmt;

use crate::mm::address::{page_round_up, PAGE_MASK};
use crate::mm::{VirtAddr, PAGE_SIZE};

/// Size of the ELF32 file header.
pub const EHDR_SIZE: usize = 52;

/// Size of one ELF32 program header.
pub const PHDR_SIZE: usize = 32;

/// Identification bytes: magic, 32-bit class, little endian, version 1.
pub const ELF_IDENT: [u8; 7] = [0x7F, b'E', b'L', b'F', 1, 1, 1];

/// Machine type: Intel 80386
pub const EM_386: u16 = 3;

/// Upper bound on the number of program headers.
pub const MAX_PHNUM: u16 = 1024;

bitflags! {
    /// Segment permission flags (`p_flags`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SegmentFlags: u32 {
        /// Executable.
        const X = 1;
        /// Writable.
        const W = 2;
        /// Readable.
        const R = 4;
    }
}

/// Program header type (`p_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentType {
    /// Unused entry.
    Null,
    /// Loadable segment.
    Load,
    /// Dynamic linking info.
    Dynamic,
    /// Interpreter path.
    Interp,
    /// Auxiliary info.
    Note,
    /// Reserved.
    Shlib,
    /// The program header table itself.
    Phdr,
    /// GNU stack permissions.
    Stack,
    /// Anything else.
    Other(u32),
}

impl From<u32> for SegmentType {
    fn from(raw: u32) -> Self {
        match raw {
            0 => Self::Null,
            1 => Self::Load,
            2 => Self::Dynamic,
            3 => Self::Interp,
            4 => Self::Note,
            5 => Self::Shlib,
            6 => Self::Phdr,
            0x6474_E551 => Self::Stack,
            other => Self::Other(other),
        }
    }
}

/// ELF parsing and validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// File shorter than the ELF header
    TooSmall,
    /// Wrong magic, class, encoding or version
    InvalidIdent,
    /// Not an i386 image
    InvalidMachine,
    /// Program header size is not 32
    InvalidPhentsize,
    /// More than 1024 program headers
    InvalidPhnum,
    /// Program header offset outside the file
    InvalidPhoff,
    /// Program header cut short by end of file
    TruncatedPhdr,
    /// Segment needs dynamic linking
    UnsupportedSegment(SegmentType),
    /// `p_offset` and `p_vaddr` have different page offsets
    MisalignedSegment,
    /// Segment data starts past the end of the file
    SegmentOutOfBounds,
    /// Memory size smaller than file size
    InvalidMemSize,
    /// Zero-sized segment
    EmptySegment,
    /// Segment reaches outside user space
    NotUserMemory,
    /// Segment would map page 0
    MapsPageZero,
}

impl fmt::Display for ElfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooSmall => write!(f, "file too small for ELF header"),
            Self::InvalidIdent => write!(f, "not a 32-bit little-endian ELF"),
            Self::InvalidMachine => write!(f, "not an i386 executable"),
            Self::InvalidPhentsize => write!(f, "bad program header size"),
            Self::InvalidPhnum => write!(f, "too many program headers"),
            Self::InvalidPhoff => write!(f, "program header offset out of file"),
            Self::TruncatedPhdr => write!(f, "truncated program header"),
            Self::UnsupportedSegment(t) => write!(f, "unsupported segment {:?}", t),
            Self::MisalignedSegment => write!(f, "segment file/memory offsets disagree"),
            Self::SegmentOutOfBounds => write!(f, "segment outside file"),
            Self::InvalidMemSize => write!(f, "segment memsz < filesz"),
            Self::EmptySegment => write!(f, "empty segment"),
            Self::NotUserMemory => write!(f, "segment outside user memory"),
            Self::MapsPageZero => write!(f, "segment maps page 0"),
        }
    }
}

fn u16_at(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// The fields of the ELF32 file header the loader uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    /// Entry point virtual address.
    pub entry: u32,
    /// Program header table file offset.
    pub phoff: u32,
    /// Program header table entry count.
    pub phnum: u16,
}

impl ElfHeader {
    /// Decode and validate a header.
    pub fn parse(bytes: &[u8]) -> Result<Self, ElfError> {
        if bytes.len() < EHDR_SIZE {
            return Err(ElfError::TooSmall);
        }
        if bytes[..ELF_IDENT.len()] != ELF_IDENT {
            return Err(ElfError::InvalidIdent);
        }
        if u16_at(bytes, 18) != EM_386 {
            return Err(ElfError::InvalidMachine);
        }
        if u16_at(bytes, 42) as usize != PHDR_SIZE {
            return Err(ElfError::InvalidPhentsize);
        }
        let phnum = u16_at(bytes, 44);
        if phnum > MAX_PHNUM {
            return Err(ElfError::InvalidPhnum);
        }
        Ok(Self {
            entry: u32_at(bytes, 24),
            phoff: u32_at(bytes, 28),
            phnum,
        })
    }
}

/// One ELF32 program header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    /// Segment type.
    pub kind: SegmentType,
    /// File offset of the segment data.
    pub offset: u32,
    /// Virtual address of the segment.
    pub vaddr: u32,
    /// Bytes of segment data in the file.
    pub filesz: u32,
    /// Bytes of segment in memory.
    pub memsz: u32,
    /// Permissions.
    pub flags: SegmentFlags,
}

/// How a validated `PT_LOAD` segment maps onto pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLayout {
    /// Page-aligned file offset to start reading at.
    pub file_page: u32,
    /// First user page of the segment.
    pub mem_page: VirtAddr,
    /// Bytes to read from the file, starting at `file_page`.
    pub read_bytes: usize,
    /// Bytes to zero after the read bytes.
    pub zero_bytes: usize,
    /// Whether the pages are mapped writable.
    pub writable: bool,
}

impl SegmentLayout {
    /// Number of pages the segment occupies.
    pub fn pages(&self) -> usize {
        (self.read_bytes + self.zero_bytes) / PAGE_SIZE
    }
}

impl ProgramHeader {
    /// Decode a program header.
    pub fn parse(bytes: &[u8]) -> Result<Self, ElfError> {
        if bytes.len() < PHDR_SIZE {
            return Err(ElfError::TruncatedPhdr);
        }
        Ok(Self {
            kind: SegmentType::from(u32_at(bytes, 0)),
            offset: u32_at(bytes, 4),
            vaddr: u32_at(bytes, 8),
            filesz: u32_at(bytes, 16),
            memsz: u32_at(bytes, 20),
            flags: SegmentFlags::from_bits_truncate(u32_at(bytes, 24)),
        })
    }

    /// Check that a `PT_LOAD` segment can be mapped for a file of
    /// `file_len` bytes.
    pub fn validate(&self, file_len: u32) -> Result<(), ElfError> {
        let mask = PAGE_MASK as u32;
        if self.offset & mask != self.vaddr & mask {
            return Err(ElfError::MisalignedSegment);
        }
        if self.offset > file_len {
            return Err(ElfError::SegmentOutOfBounds);
        }
        if self.memsz < self.filesz {
            return Err(ElfError::InvalidMemSize);
        }
        if self.memsz == 0 {
            return Err(ElfError::EmptySegment);
        }
        let start = VirtAddr::new(self.vaddr as usize);
        let end = self
            .vaddr
            .checked_add(self.memsz)
            .map(|end| VirtAddr::new(end as usize))
            .ok_or(ElfError::NotUserMemory)?;
        if !start.is_user() || !end.is_user() {
            return Err(ElfError::NotUserMemory);
        }
        if (self.vaddr as usize) < PAGE_SIZE {
            return Err(ElfError::MapsPageZero);
        }
        Ok(())
    }

    /// Page layout of a validated segment.
    pub fn layout(&self) -> SegmentLayout {
        let page_offset = self.vaddr as usize & PAGE_MASK;
        let memsz = self.memsz as usize;
        let read_bytes = if self.filesz > 0 {
            page_offset + self.filesz as usize
        } else {
            0
        };
        SegmentLayout {
            file_page: self.offset & !(PAGE_MASK as u32),
            mem_page: VirtAddr::new(self.vaddr as usize).align_down(),
            read_bytes,
            zero_bytes: page_round_up(page_offset + memsz) - read_bytes,
            writable: self.flags.contains(SegmentFlags::W),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ElfBuilder;

    fn load_phdr(offset: u32, vaddr: u32, filesz: u32, memsz: u32) -> ProgramHeader {
        ProgramHeader {
            kind: SegmentType::Load,
            offset,
            vaddr,
            filesz,
            memsz,
            flags: SegmentFlags::R | SegmentFlags::X,
        }
    }

    #[test]
    fn test_parse_valid_header() {
        let image = ElfBuilder::new(0x0804_8054)
            .segment(0x0804_8000, b"code", 4, false)
            .build();
        let header = ElfHeader::parse(&image).unwrap();
        assert_eq!(header.entry, 0x0804_8054);
        assert_eq!(header.phoff, EHDR_SIZE as u32);
        assert_eq!(header.phnum, 1);
    }

    #[test]
    fn test_header_rejections() {
        let good = ElfBuilder::new(0x0804_8054).build();
        assert_eq!(ElfHeader::parse(&good[..40]), Err(ElfError::TooSmall));

        let mut bad = good.clone();
        bad[4] = 2; // 64-bit class
        assert_eq!(ElfHeader::parse(&bad), Err(ElfError::InvalidIdent));

        let mut bad = good.clone();
        bad[18] = 62; // x86_64
        assert_eq!(ElfHeader::parse(&bad), Err(ElfError::InvalidMachine));

        let mut bad = good.clone();
        bad[42] = 56;
        assert_eq!(ElfHeader::parse(&bad), Err(ElfError::InvalidPhentsize));

        let mut bad = good;
        bad[44..46].copy_from_slice(&1025u16.to_le_bytes());
        assert_eq!(ElfHeader::parse(&bad), Err(ElfError::InvalidPhnum));
    }

    #[test]
    fn test_segment_type_decoding() {
        assert_eq!(SegmentType::from(1), SegmentType::Load);
        assert_eq!(SegmentType::from(0x6474_E551), SegmentType::Stack);
        assert_eq!(SegmentType::from(0x7000_0000), SegmentType::Other(0x7000_0000));
    }

    #[test]
    fn test_validate_segment() {
        let len = 0x2000;
        assert!(load_phdr(0x1000, 0x0804_8000, 0x100, 0x200).validate(len).is_ok());
        assert_eq!(
            load_phdr(0x1004, 0x0804_8000, 0x100, 0x200).validate(len),
            Err(ElfError::MisalignedSegment)
        );
        assert_eq!(
            load_phdr(0x3000, 0x0804_8000, 0x100, 0x200).validate(len),
            Err(ElfError::SegmentOutOfBounds)
        );
        assert_eq!(
            load_phdr(0x1000, 0x0804_8000, 0x200, 0x100).validate(len),
            Err(ElfError::InvalidMemSize)
        );
        assert_eq!(
            load_phdr(0x1000, 0x0804_8000, 0, 0).validate(len),
            Err(ElfError::EmptySegment)
        );
        assert_eq!(
            load_phdr(0x1000, 0xBFFF_F000, 0, 0x2000).validate(len),
            Err(ElfError::NotUserMemory)
        );
        assert_eq!(
            load_phdr(0x1000, 0xFFFF_F000, 0, 0x2000).validate(len),
            Err(ElfError::NotUserMemory)
        );
        assert_eq!(
            load_phdr(0, 0, 0, 0x10).validate(len),
            Err(ElfError::MapsPageZero)
        );
    }

    #[test]
    fn test_layout_with_file_data() {
        let layout = load_phdr(0x1234, 0x0804_8234, 0x100, 0x1F00).layout();
        assert_eq!(layout.file_page, 0x1000);
        assert_eq!(layout.mem_page, VirtAddr::new(0x0804_8000));
        assert_eq!(layout.read_bytes, 0x334);
        assert_eq!(layout.read_bytes + layout.zero_bytes, 0x3000);
        assert_eq!(layout.pages(), 3);
        assert!(!layout.writable);
    }

    #[test]
    fn test_layout_bss_only() {
        let mut phdr = load_phdr(0, 0x0804_A010, 0, 0x20);
        phdr.flags |= SegmentFlags::W;
        let layout = phdr.layout();
        assert_eq!(layout.read_bytes, 0);
        assert_eq!(layout.zero_bytes, PAGE_SIZE);
        assert!(layout.writable);
    }
}
