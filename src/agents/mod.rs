/// Agent delegation for icon generation.
///
/// **Orchestrator** drives one icon task through two capabilities, in order:
/// - `consult_stylist`: runs the stylist agent as a nested task
/// - `generate_image`: hands the refined prompt to the image pipeline
///
/// **Stylist** owns a single internal capability, `refine`, and turns the
/// request context into a generation prompt.
pub mod capability;
pub mod orchestrator;
pub mod stylist;
pub mod tools;

pub use capability::{Capability, CapabilityOutput, CapabilitySet};
pub use orchestrator::{Orchestrator, TaskOutcome, TaskPhase, TaskRun};
pub use stylist::{StylistAgent, StylistOutput};
pub use tools::{CONSULT_STYLIST, GENERATE_IMAGE, STYLIST_MARKER, strip_stylist_marker};
