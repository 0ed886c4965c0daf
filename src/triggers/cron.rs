//! Five-field minute-resolution schedules

use chrono::{DateTime, Datelike, Timelike, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::interpreter::types::{Node, Number};

/// `(minute, hour, day, month, weekday)`; `None` matches any value
///
/// Weekday counts from Sunday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CronPattern {
    pub minute: Option<u32>,
    pub hour: Option<u32>,
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub weekday: Option<u32>,
}

impl CronPattern {
    /// Read a pattern from five `*` or non-negative integer literals
    pub fn from_nodes(items: &[Node]) -> Option<CronPattern> {
        let [minute, hour, day, month, weekday] = items else {
            return None;
        };
        Some(CronPattern {
            minute: field(minute)?,
            hour: field(hour)?,
            day: field(day)?,
            month: field(month)?,
            weekday: field(weekday)?,
        })
    }

    pub fn matches<T: Datelike + Timelike>(&self, at: &T) -> bool {
        let check = |field: Option<u32>, actual: u32| field.map_or(true, |want| want == actual);
        check(self.minute, at.minute())
            && check(self.hour, at.hour())
            && check(self.day, at.day())
            && check(self.month, at.month())
            && check(self.weekday, at.weekday().num_days_from_sunday())
    }
}

/// `Some(None)` for a wildcard, `Some(Some(n))` for a literal, `None` otherwise
fn field(node: &Node) -> Option<Option<u32>> {
    match node {
        Node::Any { .. } => Some(None),
        Node::Number {
            v: Number::Int(n), ..
        } => u32::try_from(*n).ok().map(Some),
        _ => None,
    }
}

/// Wall-clock source for cron loops
#[derive(Clone)]
pub struct Clock(Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>);

impl Clock {
    pub fn new(now: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        Clock(Arc::new(now))
    }

    pub fn system() -> Self {
        Clock::new(Utc::now)
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.0)()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Clock::system()
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Clock")
    }
}

/// Time left until the start of the next minute
pub fn until_next_minute<T: Timelike>(now: &T) -> Duration {
    let elapsed = Duration::from_secs(u64::from(now.second()))
        + Duration::from_nanos(u64::from(now.nanosecond().min(999_999_999)));
    Duration::from_secs(60).saturating_sub(elapsed)
}

impl fmt::Display for CronPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [self.minute, self.hour, self.day, self.month, self.weekday];
        let rendered: Vec<String> = fields
            .iter()
            .map(|field| field.map_or_else(|| "*".to_string(), |n| n.to_string()))
            .collect();
        write!(f, "{}", rendered.join(" "))
    }
}
