use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportingWindow {
    pub begin: NaiveDate,
    pub end: NaiveDate,
}

/// One (provider, location) row as the database returns it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderVisits {
    pub loc_name: String,
    pub prov_id: String,
    pub prov_name: String,
    pub counts: VisitCounts,
    pub no_show_pct: String,
    pub walk_ins_pct: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitCounts {
    pub checked_out: i64,
    pub no_shows: i64,
    pub canceled: i64,
    pub late_canceled: i64,
    pub rescheduled: i64,
    pub scheduled_appts: i64,
    pub walk_ins: i64,
}

impl VisitCounts {
    pub fn add(&mut self, other: &VisitCounts) {
        self.checked_out += other.checked_out;
        self.no_shows += other.no_shows;
        self.canceled += other.canceled;
        self.late_canceled += other.late_canceled;
        self.rescheduled += other.rescheduled;
        self.scheduled_appts += other.scheduled_appts;
        self.walk_ins += other.walk_ins;
    }
}

/// A provider row that survived filtering, with percentages as fractions.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailRow {
    pub loc_name: String,
    pub prov_id: String,
    pub prov_name: String,
    pub counts: VisitCounts,
    pub no_show_rate: f64,
    pub walk_in_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocationSummary {
    pub loc_name: String,
    pub counts: VisitCounts,
    pub no_show_rate: f64,
    pub walk_in_rate: f64,
}
