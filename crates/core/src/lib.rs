#![forbid(unsafe_code)]

pub mod model;
pub mod parser;
pub mod progress;
pub mod prompt;
pub mod roadmap;

pub use parser::{ParseOutcome, ParseRejection, parse, parse_outcomes};
pub use prompt::StudyPlanRequest;
pub use roadmap::{RoadmapError, parse_topic_list};
