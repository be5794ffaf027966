pub mod analysis;
pub mod stream;

pub use analysis::AnalysisPanel;
pub use stream::{StreamInput, StreamPanel};
