use crate::config::ALL_GROUP;
use crate::{GroupConfig, Record};

/// A named view over the canonical record list. Members are indices into that
/// list, so every view observes the same record instances.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupView {
    pub name: String,
    pub members: Vec<usize>,
}

impl GroupView {
    pub fn records<'a>(&'a self, all: &'a [Record]) -> impl Iterator<Item = &'a Record> + 'a {
        self.members.iter().filter_map(move |index| all.get(*index))
    }
}

/// State filter passes when the group targets every state or the issue's state
/// equals the target; label filter passes when the issue carries every
/// required label. Records without a raw issue only match unfiltered groups.
pub fn record_matches(record: &Record, group: &GroupConfig) -> bool {
    let Some(raw) = record.raw.as_ref() else {
        return group.target_state().is_none() && group.labels.is_empty();
    };
    let state_ok = group
        .target_state()
        .is_none_or(|target| raw.state == target);
    let labels_ok = group.labels.iter().all(|label| raw.has_label(label));
    state_ok && labels_ok
}

/// Builds the `all` view followed by one view per configured group, in
/// configuration order. Membership preserves fetch order.
pub fn group_records(records: &[Record], groups: &[GroupConfig]) -> Vec<GroupView> {
    let mut views = Vec::with_capacity(groups.len() + 1);
    views.push(GroupView {
        name: ALL_GROUP.to_string(),
        members: (0..records.len()).collect(),
    });
    for group in groups {
        let members: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| record_matches(record, group))
            .map(|(index, _)| index)
            .collect();
        tracing::debug!(group = %group.name, matched = members.len(), "grouped records");
        views.push(GroupView {
            name: group.name.clone(),
            members,
        });
    }
    views
}
