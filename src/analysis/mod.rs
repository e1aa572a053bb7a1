mod aligner;
mod methylation;
mod report;
mod run;
mod sheets;
mod trace;
mod types;

pub use aligner::*;
pub use methylation::*;
pub use report::*;
pub use run::*;
pub use sheets::*;
pub use trace::*;
pub use types::*;
