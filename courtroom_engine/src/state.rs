/// Courtroom Engine: State Construction
///
/// Splits a scenario's messages into the three working sets and builds the
/// initial state of a run. Deterministic: the same scenario always yields the
/// same identities.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::domain::{
    Countdown, DockItem, EngineConstants, EngineState, Message, MessageCategory, Overlay,
    Scenario, SessionStats, SlotScheduler, Stage, TaskItem,
};
use crate::timing::total_seconds;

/// The three disjoint working sets derived from a scenario.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pools {
    pub tasks: Vec<TaskItem>,
    pub normals: VecDeque<DockItem>,
    pub criticals: VecDeque<DockItem>,
}

/// Partition `messages` by category, preserving order. Identities continue
/// from `next_uid`.
pub fn partition_pools(messages: &[Message], next_uid: &mut u64) -> Pools {
    let mut pools = Pools::default();
    let mut uid = || {
        *next_uid += 1;
        format!("i{}", *next_uid)
    };

    for m in messages {
        match m.category {
            MessageCategory::Task => pools.tasks.push(TaskItem {
                id: uid(),
                message: m.clone(),
                draft: String::new(),
            }),
            MessageCategory::Interruption => pools.normals.push_back(pooled(uid(), m)),
            MessageCategory::Critical => pools.criticals.push_back(pooled(uid(), m)),
        }
    }

    pools
}

fn pooled(id: String, m: &Message) -> DockItem {
    DockItem {
        id,
        key: m.key(),
        message: m.clone(),
        is_open: false,
        stage: Stage::Initial,
        stage_deadline_at: None,
    }
}

/// Fresh state for a run of `scenario` starting at `now`.
pub fn create_initial_state(
    scenario: &Scenario,
    constants: &EngineConstants,
    now: u64,
) -> EngineState {
    let mut next_uid = 0;
    let pools = partition_pools(&scenario.messages, &mut next_uid);
    let total = total_seconds(scenario.timer_minutes);

    EngineState {
        scenario: scenario.clone(),
        constants: constants.clone(),
        countdown: Countdown {
            total_seconds: total,
            seconds_left: total,
            running: false,
        },
        tasks: pools.tasks,
        pool_normals: pools.normals,
        pool_criticals: pools.criticals,
        dock: Vec::new(),
        delayed: BTreeMap::new(),
        scheduler: SlotScheduler {
            last_slot_at: now,
            last_critical_at: None,
            non_critical_gap: 0,
        },
        overlay: Overlay::None,
        stats: SessionStats::default(),
        retired: BTreeSet::new(),
        next_uid,
    }
}
