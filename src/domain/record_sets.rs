use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::{
    IndicatorCategory, IndicatorType, NormalizedBudget, NormalizedOverview, NormalizedPerformance,
    NormalizedRecord, NormalizedSchedule, NumericValue, RawRecord, RawRecordId, SubProject,
    SubProjectId,
};

/// Outcome of checking a performance row against rows already stored
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    New,
    /// Same key, same value: a repeated extraction of the same line
    Duplicate,
    /// Same key, different value: the stored value wins
    Conflict { kept: NumericValue },
}

/// What `RecordSets::absorb` declined to copy over
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbsorbOutcome {
    pub duplicate_performances: Vec<NormalizedPerformance>,
    /// Dropped rows paired with the value that was kept
    pub conflicting_performances: Vec<(NormalizedPerformance, NumericValue)>,
    pub overview_conflicts: Vec<(SubProjectId, &'static str)>,
}

/// Monotonic surrogate id source, starting at 1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

/// The six record sets handed to the loader
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordSets {
    pub sub_projects: Vec<SubProject>,
    pub raw_records: Vec<RawRecord>,
    pub schedules: Vec<NormalizedSchedule>,
    pub performances: Vec<NormalizedPerformance>,
    pub budgets: Vec<NormalizedBudget>,
    pub overviews: Vec<NormalizedOverview>,
    #[serde(skip)]
    ids: SetIds,
}

#[derive(Debug, Clone, Default)]
struct SetIds {
    raw: IdAllocator,
    schedule: IdAllocator,
    performance: IdAllocator,
    budget: IdAllocator,
    overview: IdAllocator,
}

/// Row counts per set plus the schedule quarter distribution
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSetStatistics {
    pub sub_projects: usize,
    pub raw_records: usize,
    pub schedules: usize,
    pub performances: usize,
    pub budgets: usize,
    pub overviews: usize,
    /// Keyed by quarter value; "unparsed" counts rows without a quarter
    pub quarter_distribution: BTreeMap<String, usize>,
}

impl RecordSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sub-project set with a registry snapshot
    pub fn set_sub_projects(&mut self, sub_projects: Vec<SubProject>) {
        self.sub_projects = sub_projects;
    }

    /// Store a raw audit record, assigning its surrogate id
    pub fn push_raw(&mut self, mut raw: RawRecord) -> RawRecordId {
        let id = RawRecordId(self.ids.raw.next_id());
        raw.id = id;
        self.raw_records.push(raw);
        id
    }

    /// Route a normalized record to its typed set, assigning its surrogate id
    pub fn push(&mut self, record: NormalizedRecord) -> u64 {
        match record {
            NormalizedRecord::Schedule(mut r) => {
                r.id = self.ids.schedule.next_id();
                let id = r.id;
                self.schedules.push(r);
                id
            }
            NormalizedRecord::Performance(mut r) => {
                r.id = self.ids.performance.next_id();
                let id = r.id;
                self.performances.push(r);
                id
            }
            NormalizedRecord::Budget(mut r) => {
                r.id = self.ids.budget.next_id();
                let id = r.id;
                self.budgets.push(r);
                id
            }
            NormalizedRecord::Overview(mut r) => {
                r.id = self.ids.overview.next_id();
                let id = r.id;
                self.overviews.push(r);
                id
            }
        }
    }

    pub fn overview_for_mut(&mut self, sub_project_id: SubProjectId) -> Option<&mut NormalizedOverview> {
        self.overviews
            .iter_mut()
            .find(|o| o.sub_project_id == sub_project_id)
    }

    pub fn performances_for(
        &self,
        sub_project_id: SubProjectId,
    ) -> impl Iterator<Item = &NormalizedPerformance> {
        self.performances
            .iter()
            .filter(move |p| p.sub_project_id == sub_project_id)
    }

    /// Check a performance row against the rows already stored for its
    /// sub-project, keyed on (category, type, source year). Unclassified
    /// values are never treated as duplicates.
    pub fn admit_performance(&self, candidate: &NormalizedPerformance) -> Admission {
        if candidate.indicator_type == IndicatorType::Unclassified
            || candidate.indicator_category == IndicatorCategory::Unclassified
        {
            return Admission::New;
        }

        let existing = self.performances_for(candidate.sub_project_id).find(|p| {
            p.indicator_category == candidate.indicator_category
                && p.indicator_type == candidate.indicator_type
                && p.source_year == candidate.source_year
        });

        match existing {
            None => Admission::New,
            Some(p) if p.value == candidate.value => Admission::Duplicate,
            Some(p) => Admission::Conflict { kept: p.value },
        }
    }

    pub fn normalized_len(&self) -> usize {
        self.schedules.len() + self.performances.len() + self.budgets.len() + self.overviews.len()
    }

    pub fn statistics(&self) -> RecordSetStatistics {
        let mut quarter_distribution = BTreeMap::new();
        for schedule in &self.schedules {
            let key = match schedule.quarter {
                Some(q) => q.value().to_string(),
                None => "unparsed".to_string(),
            };
            *quarter_distribution.entry(key).or_insert(0) += 1;
        }

        RecordSetStatistics {
            sub_projects: self.sub_projects.len(),
            raw_records: self.raw_records.len(),
            schedules: self.schedules.len(),
            performances: self.performances.len(),
            budgets: self.budgets.len(),
            overviews: self.overviews.len(),
            quarter_distribution,
        }
    }

    /// Fold record sets produced against an isolated registry into this one.
    ///
    /// `remap` translates the other registry's sub-project ids into this run's
    /// ids (see `SubProjectRegistry::merge`). Every record gets a fresh
    /// surrogate id; raw-record foreign keys are rewritten to match.
    /// Performances pass the same admission check as a single run, so a line
    /// extracted by both sides is stored once. Overviews for a sub-project
    /// that already has one are merged field by field.
    pub fn absorb(
        &mut self,
        other: RecordSets,
        remap: &HashMap<SubProjectId, SubProjectId>,
    ) -> AbsorbOutcome {
        let map_sub = |id: SubProjectId| remap.get(&id).copied().unwrap_or(id);
        let mut raw_ids: HashMap<RawRecordId, RawRecordId> = HashMap::new();

        for mut raw in other.raw_records {
            let old = raw.id;
            raw.sub_project_id = map_sub(raw.sub_project_id);
            let new = self.push_raw(raw);
            raw_ids.insert(old, new);
        }
        let map_raw = |id: RawRecordId| raw_ids.get(&id).copied().unwrap_or(id);

        for mut r in other.schedules {
            r.sub_project_id = map_sub(r.sub_project_id);
            r.raw_record_id = map_raw(r.raw_record_id);
            self.push(NormalizedRecord::Schedule(r));
        }
        let mut outcome = AbsorbOutcome::default();
        for mut r in other.performances {
            r.sub_project_id = map_sub(r.sub_project_id);
            r.raw_record_id = map_raw(r.raw_record_id);
            match self.admit_performance(&r) {
                Admission::New => {
                    self.push(NormalizedRecord::Performance(r));
                }
                Admission::Duplicate => outcome.duplicate_performances.push(r),
                Admission::Conflict { kept } => outcome.conflicting_performances.push((r, kept)),
            }
        }
        for mut r in other.budgets {
            r.sub_project_id = map_sub(r.sub_project_id);
            r.raw_record_id = map_raw(r.raw_record_id);
            self.push(NormalizedRecord::Budget(r));
        }

        for mut r in other.overviews {
            r.sub_project_id = map_sub(r.sub_project_id);
            r.raw_record_id = map_raw(r.raw_record_id);
            match self.overview_for_mut(r.sub_project_id) {
                Some(existing) => {
                    for field in existing.merge_from(&r) {
                        outcome.overview_conflicts.push((r.sub_project_id, field));
                    }
                }
                None => {
                    self.push(NormalizedRecord::Overview(r));
                }
            }
        }

        outcome
    }
}
