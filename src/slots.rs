use std::ops::Range;

// The school week: 5 afternoons of 16:00-21:00 in 15-minute slots.
pub const MINUTES_PER_SLOT: u32 = 15;
pub const SLOTS_PER_DAY: usize = 20;
pub const NUM_DAYS: usize = 5;
pub const NUM_SLOTS: usize = SLOTS_PER_DAY * NUM_DAYS;
pub const DAY_NAMES: [&str; NUM_DAYS] = ["MON", "TUE", "WED", "THU", "FRI"];
const DAY_START_HOUR: usize = 16;

/// Day index (0 = Monday) of a slot.
pub fn day_of(slot: usize) -> usize {
    slot / SLOTS_PER_DAY
}

/// The slot range making up day `day`.
pub fn day_slots(day: usize) -> Range<usize> {
    day * SLOTS_PER_DAY..(day + 1) * SLOTS_PER_DAY
}

/// True iff a class starting at `slot` with the given duration ends on the
/// day it started. Classes never span a day boundary.
pub fn same_day(slot: usize, duration_slots: usize) -> bool {
    duration_slots > 0 && day_of(slot) == day_of(slot + duration_slots - 1)
}

/// Human-readable label for a slot, e.g. `MON 16:15`.
pub fn slot_label(slot: usize) -> String {
    let within = slot % SLOTS_PER_DAY;
    let hour = DAY_START_HOUR + within / 4;
    let minute = (within % 4) as u32 * MINUTES_PER_SLOT;
    format!("{} {:02}:{:02}", DAY_NAMES[day_of(slot)], hour, minute)
}
