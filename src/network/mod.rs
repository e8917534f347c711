pub mod driver;
pub mod protocol;

pub use driver::{Connector, Driver};
pub use protocol::{ExplainReport, Namespace, PlanStage, Request, Response};
