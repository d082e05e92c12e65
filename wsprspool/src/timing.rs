//! Transmission-cycle timing validation.
//!
//! Every reporting mode transmits on a fixed cadence, so a spot's timestamp
//! must land on one of that mode's start minutes. Upstream occasionally
//! stamps a spot one minute late. No mode starts on an odd minute, which
//! makes an odd-minute violation safe to repair by shifting forward one
//! minute; an even-minute violation could belong to more than one cycle and
//! is flagged instead of guessed at.

/// Outcome of checking a spot timestamp against its mode's cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// The timestamp is consistent with the cadence, or the mode is unknown
    /// and the minute raises no suspicion.
    Valid,
    /// The timestamp sat on an odd minute and was shifted forward to the
    /// next even minute.
    Corrected { epoch: u32 },
    /// A known mode on an even minute outside its cadence. The timestamp is
    /// kept unchanged.
    Ambiguous,
}

impl Validation {
    /// The event time to store for a spot whose raw timestamp was `epoch`.
    pub fn event_time(&self, epoch: u32) -> u32 {
        match self {
            Validation::Corrected { epoch: corrected } => *corrected,
            _ => epoch,
        }
    }
}

/// Cycle length in minutes per mode code. A mode's valid start minutes are
/// the multiples of its cycle length within the hour.
const MODE_CYCLES: [(i16, u32, &str); 5] = [
    (1, 2, "WSPR-2"),
    (2, 15, "FST4W-900"),
    (3, 2, "FST4W-120"),
    (4, 5, "FST4W-300"),
    (8, 30, "FST4W-1800"),
];

fn cycle_minutes(mode_code: i16) -> Option<u32> {
    MODE_CYCLES
        .iter()
        .find(|(code, _, _)| *code == mode_code)
        .map(|(_, cycle, _)| *cycle)
}

/// Human-readable mode name for logging.
pub fn mode_name(mode_code: i16) -> Option<&'static str> {
    MODE_CYCLES
        .iter()
        .find(|(code, _, _)| *code == mode_code)
        .map(|(_, _, name)| *name)
}

/// Validate a raw epoch timestamp against the cadence of `mode_code`.
pub fn validate(epoch: u32, mode_code: i16) -> Validation {
    let minute = (epoch % 3600) / 60;
    let odd = minute % 2 == 1;

    match cycle_minutes(mode_code) {
        Some(cycle) if minute % cycle == 0 => Validation::Valid,
        Some(_) | None if odd => Validation::Corrected { epoch: epoch + 60 },
        Some(_) => Validation::Ambiguous,
        None => Validation::Valid,
    }
}
