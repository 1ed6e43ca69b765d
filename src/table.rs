//! Typed output tables
//!
//! A table is a fixed, ordered list of typed columns plus rows of cells.
//! Tables export to and import from delimited text with a header row:
//! tri-state values are written as `TRUE`/`FALSE`/`NA`, a not-a-number
//! float as `NaN` and a missing nullable float as an empty field, so the
//! three stay distinguishable after a round trip.

use crate::error::ComputeError;
use crate::types::TriState;
use std::io::{Read, Write};

/// Literal written for a not-a-number float
pub const NAN_LITERAL: &str = "NaN";

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Float where NaN is a value
    Float,
    /// Float that may be absent altogether
    NullableFloat,
    Tri,
    Integer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(name: &'static str, kind: ColumnKind) -> Self {
        Self { name, kind }
    }
}

/// One value of a table
#[derive(Debug, Clone)]
pub enum Cell {
    Text(String),
    Float(f64),
    NullableFloat(Option<f64>),
    Tri(TriState),
    Integer(i64),
}

impl Cell {
    pub fn kind(&self) -> ColumnKind {
        match self {
            Cell::Text(_) => ColumnKind::Text,
            Cell::Float(_) => ColumnKind::Float,
            Cell::NullableFloat(_) => ColumnKind::NullableFloat,
            Cell::Tri(_) => ColumnKind::Tri,
            Cell::Integer(_) => ColumnKind::Integer,
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn flag(value: bool) -> Self {
        Cell::Tri(TriState::from(value))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::NullableFloat(v) => *v,
            Cell::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Delimited-text rendering
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Float(v) => render_float(*v),
            Cell::NullableFloat(Some(v)) => render_float(*v),
            Cell::NullableFloat(None) => String::new(),
            Cell::Tri(t) => t.as_str().to_string(),
            Cell::Integer(v) => v.to_string(),
        }
    }

    /// Parse a field of a column of kind `kind`
    pub fn parse(kind: ColumnKind, field: &str) -> Result<Self, String> {
        match kind {
            ColumnKind::Text => Ok(Cell::Text(field.to_string())),
            ColumnKind::Float => parse_float(field).map(Cell::Float),
            ColumnKind::NullableFloat if field.is_empty() => Ok(Cell::NullableFloat(None)),
            ColumnKind::NullableFloat => parse_float(field).map(|v| Cell::NullableFloat(Some(v))),
            ColumnKind::Tri => match field {
                "TRUE" => Ok(Cell::Tri(TriState::True)),
                "FALSE" => Ok(Cell::Tri(TriState::False)),
                "NA" => Ok(Cell::Tri(TriState::NotApplicable)),
                other => Err(format!("'{}' is not TRUE, FALSE or NA", other)),
            },
            ColumnKind::Integer => field
                .parse::<i64>()
                .map(Cell::Integer)
                .map_err(|e| format!("'{}' is not an integer: {}", field, e)),
        }
    }
}

/// NaN equals NaN; everything else compares by value
impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        fn same(a: f64, b: f64) -> bool {
            (a.is_nan() && b.is_nan()) || a == b
        }
        match (self, other) {
            (Cell::Text(a), Cell::Text(b)) => a == b,
            (Cell::Float(a), Cell::Float(b)) => same(*a, *b),
            (Cell::NullableFloat(Some(a)), Cell::NullableFloat(Some(b))) => same(*a, *b),
            (Cell::NullableFloat(None), Cell::NullableFloat(None)) => true,
            (Cell::Tri(a), Cell::Tri(b)) => a == b,
            (Cell::Integer(a), Cell::Integer(b)) => a == b,
            _ => false,
        }
    }
}

fn render_float(value: f64) -> String {
    if value.is_nan() {
        NAN_LITERAL.to_string()
    } else {
        value.to_string()
    }
}

fn parse_float(field: &str) -> Result<f64, String> {
    if field == NAN_LITERAL {
        return Ok(f64::NAN);
    }
    field
        .parse::<f64>()
        .map_err(|e| format!("'{}' is not a number: {}", field, e))
}

/// Rows of typed cells under a fixed column order
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }

    /// Append a row; its cells must match the column kinds
    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), ComputeError> {
        if row.len() != self.columns.len() {
            return Err(ComputeError::TableError(format!(
                "row has {} cells, table has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        if let Some((column, cell)) = self
            .columns
            .iter()
            .zip(&row)
            .find(|(column, cell)| column.kind != cell.kind())
        {
            return Err(ComputeError::TableError(format!(
                "column '{}' expects {:?}, got {:?}",
                column.name,
                column.kind,
                cell.kind()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append all rows of a table with the same columns
    pub fn append(&mut self, other: Table) -> Result<(), ComputeError> {
        if other.columns != self.columns {
            return Err(ComputeError::TableError(
                "cannot concatenate tables with different columns".to_string(),
            ));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Export with a header row
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ComputeError> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(self.columns.iter().map(|c| c.name))?;
        for row in &self.rows {
            csv.write_record(row.iter().map(Cell::render))?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn to_csv_string(&self) -> Result<String, ComputeError> {
        let mut buffer = Vec::new();
        self.write_csv(&mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ComputeError::TableError(e.to_string()))
    }

    /// Import a table exported with `columns`; the header must match exactly
    pub fn read_csv<R: Read>(columns: Vec<Column>, reader: R) -> Result<Table, ComputeError> {
        let mut csv = csv::Reader::from_reader(reader);
        let header = csv.headers()?.clone();
        let expected: Vec<&str> = columns.iter().map(|c| c.name).collect();
        let found: Vec<&str> = header.iter().collect();
        if found != expected {
            return Err(ComputeError::TableError(format!(
                "header mismatch: expected [{}], found [{}]",
                expected.join(", "),
                found.join(", ")
            )));
        }

        let mut table = Table::new(columns);
        for (line, record) in csv.records().enumerate() {
            let record = record?;
            let row = table
                .columns
                .iter()
                .zip(record.iter())
                .map(|(column, field)| {
                    Cell::parse(column.kind, field).map_err(|e| {
                        ComputeError::TableError(format!(
                            "row {}, column '{}': {}",
                            line + 1,
                            column.name,
                            e
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            table.push_row(row)?;
        }
        Ok(table)
    }
}
