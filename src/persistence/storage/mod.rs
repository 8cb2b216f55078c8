//! Log segment files: naming, headers, buffered writers and directory layout.

pub mod io;
pub mod layout;
pub mod position;
pub mod segment;

pub use io::SegmentFileWriter;
pub use layout::{normalize_path, resolve_logs_dir, StoreLayout};
pub use position::LogPosition;
pub use segment::{
    list_segments, segment_file_name, HeaderDecodeError, LogFileInformation, LogSegmentStore,
    SegmentDescriptor, SegmentError, SegmentHandle, SegmentHeader, SegmentSection,
    SEGMENT_HEADER_LEN,
};
