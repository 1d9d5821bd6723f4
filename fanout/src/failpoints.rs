use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, FanOutResult};

pub const PRODUCER_BEFORE_WORK: &str = "producer.before_work";
pub const PRODUCER_BEFORE_SEND: &str = "producer.before_send";

pub fn fanout_fail_point(name: &str) -> FanOutResult<()> {
    fail_point!(name, |parameter| {
        let detail = match parameter {
            Some(parameter) => format!("The failpoint '{name}' returned an error ({parameter})"),
            None => format!("The failpoint '{name}' returned an error"),
        };

        bail!(
            ErrorKind::WithNoRetry,
            "An error occurred in a fail point",
            detail
        );
    });

    Ok(())
}
