/// Courtroom Engine: Timing Primitives
///
/// All instants are u64 milliseconds on the injected clock's timeline.
/// No wall-clock reads happen in the engine; callers pass `now` in.

/// Period of the engine tick that advances stages, releases delayed
/// entries and schedules slots.
pub const ENGINE_TICK_MS: u64 = 400;

/// Period of the session countdown.
pub const COUNTDOWN_TICK_MS: u64 = 1_000;

/// Minimum time between two delivery slots.
pub const NEXT_ITEM_INTERVAL_MS: u64 = 30_000;

/// Length of both the `initial` and the `urgent` stage windows.
pub const STAGE_MS: u64 = 120_000;

/// Non-critical slots that must separate two criticals (unless the time gap elapsed).
pub const CRIT_MIN_NONCRIT_GAP: u32 = 2;

/// Time since the last critical after which a critical may be admitted regardless
/// of the non-critical gap count.
pub const CRIT_MIN_TIME_GAP_MS: u64 = 90_000;

/// Timer budget used when a scenario carries `timerMinutes = 0`.
pub const DEFAULT_TIMER_MINUTES: u32 = 5;

/// Deadline `window` after `now`. Saturates instead of wrapping.
pub fn deadline_after(now: u64, window: u64) -> u64 {
    now.saturating_add(window)
}

/// Milliseconds elapsed from `since` to `now`; zero if `now` precedes `since`.
pub fn elapsed(now: u64, since: u64) -> u64 {
    now.saturating_sub(since)
}

/// Countdown length in seconds for a timer budget in minutes. Never below one.
pub fn total_seconds(timer_minutes: u32) -> u32 {
    let minutes = if timer_minutes == 0 {
        DEFAULT_TIMER_MINUTES
    } else {
        timer_minutes
    };
    minutes.saturating_mul(60).max(1)
}

/// `MM:SS` rendering of a second count, as shown on the session timer.
pub fn format_mm_ss(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Whole seconds left until `deadline`, rounded up, never negative.
pub fn seconds_until(deadline: u64, now: u64) -> u64 {
    deadline.saturating_sub(now).div_ceil(1_000)
}
