//! Conversation pipeline: backend interfaces, incremental segmentation and
//! the session loop tying them to the speech dispatcher

pub mod backend;
pub mod screenplay;
pub mod segmenter;
pub mod session;

pub use backend::{build_request, ChatBackend, ChatStream, ChunkStream};
pub use screenplay::{Emotion, Screenplay};
pub use segmenter::{Segment, SentenceSegmenter};
pub use session::{CancelFlag, ChatSession};
