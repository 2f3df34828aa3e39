mod cookie;
mod icons;
mod links;
mod results;
mod trigger;

pub use cookie::SessionCookie;
pub(crate) use icons::StatusIcon;
pub(crate) use links::query_value;
pub use links::{LinkRequest, LinkResponse};
pub use results::{Filter, PackageResults, TestResult};
pub use trigger::{TestState, TestStatus, TriggerResult};
