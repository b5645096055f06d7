use std::time::{Duration, Instant};

/// Lets an action through at most once per interval.
#[derive(Debug)]
pub struct Throttle {
  interval: Duration,
  last: Option<Instant>,
}

impl Throttle {
  pub fn new(interval: Duration) -> Self {
    Self { interval, last: None }
  }

  /// Returns `true` (and records `now`) if the interval has passed since the last pass.
  pub fn ready(&mut self, now: Instant) -> bool {
    match self.last {
      Some(last) if now.saturating_duration_since(last) < self.interval => false,
      _ => {
        self.last = Some(now);
        true
      }
    }
  }

  /// Let the next call through regardless of timing.
  pub fn reset(&mut self) {
    self.last = None;
  }
}

/// Suppresses automatic scrolling for a cooldown window after the user scrolls by hand.
#[derive(Debug)]
pub struct AutoScrollGate {
  cooldown: Duration,
  blocked_until: Option<Instant>,
}

impl AutoScrollGate {
  pub fn new(cooldown: Duration) -> Self {
    Self { cooldown, blocked_until: None }
  }

  pub fn user_scrolled(&mut self, now: Instant) {
    self.blocked_until = Some(now + self.cooldown);
  }

  pub fn allows(&self, now: Instant) -> bool {
    self.blocked_until.is_none_or(|until| now >= until)
  }

  pub fn clear(&mut self) {
    self.blocked_until = None;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn throttle_first_call_passes() {
    let mut t = Throttle::new(Duration::from_millis(500));
    assert!(t.ready(Instant::now()));
  }

  #[test]
  fn throttle_blocks_within_interval() {
    let mut t = Throttle::new(Duration::from_millis(500));
    let start = Instant::now();
    assert!(t.ready(start));
    assert!(!t.ready(start + Duration::from_millis(100)));
    assert!(!t.ready(start + Duration::from_millis(499)));
    assert!(t.ready(start + Duration::from_millis(500)));
    assert!(!t.ready(start + Duration::from_millis(700)));
    assert!(t.ready(start + Duration::from_millis(1000)));
  }

  #[test]
  fn throttle_reset() {
    let mut t = Throttle::new(Duration::from_secs(10));
    let start = Instant::now();
    assert!(t.ready(start));
    t.reset();
    assert!(t.ready(start + Duration::from_millis(1)));
  }

  #[test]
  fn gate_open_until_user_scrolls() {
    let mut gate = AutoScrollGate::new(Duration::from_secs(2));
    let start = Instant::now();
    assert!(gate.allows(start));
    gate.user_scrolled(start);
    assert!(!gate.allows(start + Duration::from_millis(1999)));
    assert!(gate.allows(start + Duration::from_secs(2)));
  }

  #[test]
  fn gate_cooldown_restarts_on_each_scroll() {
    let mut gate = AutoScrollGate::new(Duration::from_secs(2));
    let start = Instant::now();
    gate.user_scrolled(start);
    gate.user_scrolled(start + Duration::from_millis(1500));
    assert!(!gate.allows(start + Duration::from_millis(3000)));
    assert!(gate.allows(start + Duration::from_millis(3500)));
    gate.user_scrolled(start + Duration::from_millis(3500));
    gate.clear();
    assert!(gate.allows(start + Duration::from_millis(3600)));
  }
}
