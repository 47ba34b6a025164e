mod support;

mod drive_tuning;
mod eject_sequence;
mod fault_recovery;
mod resource_exclusion;
