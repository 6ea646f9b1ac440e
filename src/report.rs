use std::path::Path;

use rust_xlsxwriter::{Format, FormatBorder, Workbook, XlsxError};
use tracing::info;

use crate::aggregate::format_percent;
use crate::error::ReportError;
use crate::models::{DetailRow, LocationSummary, ReportingWindow, VisitCounts};

pub const TITLE_HEADERS: [&str; 3] = ["Report", "Start Date", "End Date"];

pub const DETAIL_HEADERS: [&str; 12] = [
    "Loc_Name",
    "Prov_ID",
    "Prov_Name",
    "Checked_Out",
    "No_Shows",
    "No_Show_%",
    "Canceled",
    "Late_Canceled",
    "Rescheduled",
    "Scheduled_Appts",
    "Walk_Ins",
    "Walk_Ins_%",
];

/// Summary rows start under `Prov_Name` so their counts line up with the detail columns.
const SUMMARY_START_COL: u16 = 2;
const TOTAL_LABEL: &str = "Total";

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub row: u32,
    pub col: u16,
    pub value: CellValue,
    pub header: bool,
}

#[derive(Default)]
struct SheetPlan {
    cells: Vec<Cell>,
}

impl SheetPlan {
    fn put(&mut self, row: u32, col: u16, value: CellValue, header: bool) {
        self.cells.push(Cell {
            row,
            col,
            value,
            header,
        });
    }

    fn text(&mut self, row: u32, col: u16, value: &str) {
        self.put(row, col, CellValue::Text(value.to_string()), false);
    }

    fn headers(&mut self, row: u32, names: &[&str]) {
        for (col, name) in names.iter().enumerate() {
            self.put(row, col as u16, CellValue::Text(name.to_string()), true);
        }
    }

    /// Writes the seven counts and two rates starting at `col`, in detail column order.
    fn measures(&mut self, row: u32, col: u16, counts: &VisitCounts, no_show: f64, walk_in: f64) {
        let values = [
            CellValue::Number(counts.checked_out as f64),
            CellValue::Number(counts.no_shows as f64),
            CellValue::Text(format_percent(no_show)),
            CellValue::Number(counts.canceled as f64),
            CellValue::Number(counts.late_canceled as f64),
            CellValue::Number(counts.rescheduled as f64),
            CellValue::Number(counts.scheduled_appts as f64),
            CellValue::Number(counts.walk_ins as f64),
            CellValue::Text(format_percent(walk_in)),
        ];
        for (offset, value) in values.into_iter().enumerate() {
            self.put(row, col + offset as u16, value, false);
        }
    }
}

/// Lays out the title block and one detail block plus `Total` row per location.
pub fn plan_sheet(
    title: &str,
    window: &ReportingWindow,
    details: &[DetailRow],
    summaries: &[LocationSummary],
) -> Vec<Cell> {
    let mut plan = SheetPlan::default();

    plan.headers(0, &TITLE_HEADERS);
    plan.text(1, 0, title);
    plan.text(1, 1, &window.begin_mdy());
    plan.text(1, 2, &window.end_mdy());

    let mut row: u32 = 3;

    for summary in summaries {
        let rows: Vec<&DetailRow> = details
            .iter()
            .filter(|d| d.loc_name == summary.loc_name)
            .collect();

        plan.headers(row, &DETAIL_HEADERS);
        row += 1;
        for detail in rows {
            plan.text(row, 0, &detail.loc_name);
            plan.text(row, 1, &detail.prov_id);
            plan.text(row, 2, &detail.prov_name);
            plan.measures(row, 3, &detail.counts, detail.no_show_rate, detail.walk_in_rate);
            row += 1;
        }

        plan.text(row, 0, TOTAL_LABEL);
        plan.text(row, SUMMARY_START_COL, &summary.loc_name);
        plan.measures(
            row,
            SUMMARY_START_COL + 1,
            &summary.counts,
            summary.no_show_rate,
            summary.walk_in_rate,
        );
        // Two blank rows before the next location's header.
        row += 3;
    }

    plan.cells
}

/// Writes the planned sheet to `path`, replacing any existing file.
pub fn write_workbook(path: &Path, cells: &[Cell]) -> Result<(), ReportError> {
    build_workbook(cells)
        .and_then(|mut workbook| workbook.save(path))
        .map_err(|source| ReportError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;
    info!(path = %path.display(), cells = cells.len(), "workbook written");
    Ok(())
}

fn build_workbook(cells: &[Cell]) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold().set_border(FormatBorder::Thin);
    let sheet = workbook.add_worksheet();

    sheet.set_column_width(0, 28)?;
    sheet.set_column_width(2, 28)?;
    for col in 3..DETAIL_HEADERS.len() as u16 {
        sheet.set_column_width(col, 15)?;
    }

    for cell in cells {
        match (&cell.value, cell.header) {
            (CellValue::Text(text), true) => {
                sheet.write_string_with_format(cell.row, cell.col, text, &header)?;
            }
            (CellValue::Text(text), false) => {
                sheet.write_string(cell.row, cell.col, text)?;
            }
            (CellValue::Number(number), true) => {
                sheet.write_number_with_format(cell.row, cell.col, *number, &header)?;
            }
            (CellValue::Number(number), false) => {
                sheet.write_number(cell.row, cell.col, *number)?;
            }
        }
    }

    Ok(workbook)
}
