//! Day, model and project rollups over ingested records

use crate::clock::local_date;
use ccmeter_types::{
    DailyUsage, HistoryResult, ModelUsage, ProjectUsage, SessionBlock, TokenCounts, UsageRecord,
};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Totals for one local calendar day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayTotals {
    pub tokens: TokenCounts,
    pub cost: f64,
    pub record_count: usize,
    pub by_model: Vec<ModelUsage>,
}

/// Aggregate the records that fall on `date` (local time)
pub fn aggregate_day(records: &[UsageRecord], date: NaiveDate) -> DayTotals {
    let todays: Vec<&UsageRecord> = records
        .iter()
        .filter(|r| local_date(r.timestamp) == date)
        .collect();

    DayTotals {
        tokens: todays.iter().map(|r| &r.tokens).sum(),
        cost: todays.iter().map(|r| r.cost).sum(),
        record_count: todays.len(),
        by_model: by_model(todays.iter().copied()),
    }
}

/// Full aggregate over every record
pub fn aggregate_history(records: &[UsageRecord], blocks: Vec<SessionBlock>) -> HistoryResult {
    let mut daily: BTreeMap<NaiveDate, (DailyUsage, BTreeSet<String>)> = BTreeMap::new();

    for record in records {
        let date = local_date(record.timestamp);
        let (day, models) = daily.entry(date).or_insert_with(|| {
            (
                DailyUsage {
                    date,
                    tokens: TokenCounts::zero(),
                    cost: 0.0,
                    records: 0,
                    models: Vec::new(),
                },
                BTreeSet::new(),
            )
        });
        day.tokens += record.tokens;
        day.cost += record.cost;
        day.records += 1;
        if !models.contains(&record.model) {
            models.insert(record.model.clone());
        }
    }

    let daily = daily
        .into_values()
        .map(|(mut day, models)| {
            day.models = models.into_iter().collect();
            day
        })
        .collect();

    HistoryResult {
        tokens: records.iter().map(|r| &r.tokens).sum(),
        cost: records.iter().map(|r| r.cost).sum(),
        record_count: records.len(),
        daily,
        by_model: by_model(records.iter()),
        by_project: by_project(records),
        blocks,
        first_record: records.iter().map(|r| r.timestamp).min(),
        last_record: records.iter().map(|r| r.timestamp).max(),
    }
}

/// Per-model usage, most expensive first
pub fn by_model<'a>(records: impl Iterator<Item = &'a UsageRecord>) -> Vec<ModelUsage> {
    let mut map: HashMap<&str, ModelUsage> = HashMap::new();
    for record in records {
        let entry = map.entry(record.model.as_str()).or_insert_with(|| ModelUsage {
            model: record.model.clone(),
            ..ModelUsage::default()
        });
        entry.tokens += record.tokens;
        entry.cost += record.cost;
        entry.records += 1;
    }

    let mut models: Vec<ModelUsage> = map.into_values().collect();
    models.sort_by(|a, b| b.cost.total_cmp(&a.cost).then_with(|| a.model.cmp(&b.model)));
    models
}

/// Per-project usage, most expensive first
pub fn by_project(records: &[UsageRecord]) -> Vec<ProjectUsage> {
    let mut map: HashMap<&str, ProjectUsage> = HashMap::new();
    for record in records {
        let entry = map
            .entry(record.project.as_str())
            .or_insert_with(|| ProjectUsage {
                project: record.project.clone(),
                ..ProjectUsage::default()
            });
        entry.tokens += record.tokens;
        entry.cost += record.cost;
        entry.records += 1;
    }

    let mut projects: Vec<ProjectUsage> = map.into_values().collect();
    projects.sort_by(|a, b| {
        b.cost
            .total_cmp(&a.cost)
            .then_with(|| a.project.cmp(&b.project))
    });
    projects
}
