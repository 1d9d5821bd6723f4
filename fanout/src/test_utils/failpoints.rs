use fail::FailScenario;

/// Fail point configuration scoped to a test.
///
/// Holding the scenario serializes tests touching fail points. Every configured fail point is
/// turned off again when the scenario is dropped.
pub struct ScopedFailScenario<'a> {
    _scenario: FailScenario<'a>,
    failpoints: Vec<String>,
}

impl<'a> ScopedFailScenario<'a> {
    /// Configures every `(failpoint, action)` pair, for example `("producer.before_work", "return")`.
    pub fn setup(failpoints: &[(&str, &str)]) -> ScopedFailScenario<'a> {
        let scenario = FailScenario::setup();

        for (failpoint, action) in failpoints {
            fail::cfg(*failpoint, action).unwrap();
        }

        Self {
            _scenario: scenario,
            failpoints: failpoints
                .iter()
                .map(|(failpoint, _)| failpoint.to_string())
                .collect(),
        }
    }
}

impl Drop for ScopedFailScenario<'_> {
    fn drop(&mut self) {
        for failpoint in &self.failpoints {
            let _ = fail::cfg(failpoint.as_str(), "off");
        }
    }
}
