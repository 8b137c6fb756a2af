//! Reader for the Solomon VRPTW benchmark format.
//!
//! ```text
//! C101
//!
//! VEHICLE
//! NUMBER     CAPACITY
//!   25         200
//!
//! CUSTOMER
//! CUST NO.  XCOORD.   YCOORD.    DEMAND   READY TIME  DUE DATE   SERVICE TIME
//!     0      40         50          0          0       1236          0
//!     1      45         68         10        912        967         90
//! ```
//!
//! The first row after the `CUSTOMER` header is the depot. Due dates are
//! taken as written.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ParseError;
use crate::models::{Node, ProblemInstance, TimeWindow, VehicleFleet};

const ROW_FIELDS: usize = 7;

/// Parses a Solomon instance from text.
///
/// # Errors
///
/// Returns [`ParseError`] if a section or the vehicle line is missing, a
/// row is malformed, there are no rows, or the data fails instance
/// validation.
///
/// # Examples
///
/// ```
/// use u_cvrptw::io::parse_solomon;
///
/// let text = "\
/// TINY
///
/// VEHICLE
/// NUMBER     CAPACITY
///   2          10
///
/// CUSTOMER
/// CUST NO.  XCOORD.  YCOORD.  DEMAND  READY TIME  DUE DATE  SERVICE TIME
///     0      0        0        0       0          100       0
///     1      3        4        5       0          50        2
/// ";
/// let instance = parse_solomon(text).unwrap();
/// assert_eq!(instance.num_customers(), 1);
/// assert_eq!(instance.fleet_size(), 2);
/// assert_eq!(instance.node(1).due_date(), 50.0);
/// ```
pub fn parse_solomon(text: &str) -> Result<ProblemInstance, ParseError> {
    let mut lines = text.lines().enumerate().map(|(i, line)| (i + 1, line.trim()));
    let name = lines
        .clone()
        .map(|(_, line)| line)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string();

    lines
        .by_ref()
        .find(|(_, line)| line.starts_with("VEHICLE"))
        .ok_or(ParseError::MissingSection("VEHICLE"))?;

    let mut fleet = None;
    let mut found_customer = false;
    for (line_no, line) in lines.by_ref() {
        if line.starts_with("CUSTOMER") {
            found_customer = true;
            break;
        }
        if fleet.is_none() {
            fleet = parse_vehicle_line(line);
            if fleet.is_none() && starts_with_digit(line) {
                return Err(ParseError::InvalidRow {
                    line: line_no,
                    reason: "expected `fleet_size capacity`".into(),
                });
            }
        }
    }
    let (size, capacity) = match (fleet, found_customer) {
        (Some(fleet), true) => fleet,
        (None, _) => return Err(ParseError::MissingVehicleLine),
        (Some(_), false) => return Err(ParseError::MissingSection("CUSTOMER")),
    };

    let mut nodes = Vec::new();
    for (line_no, line) in lines {
        if line.is_empty() || (nodes.is_empty() && !starts_with_digit(line)) {
            continue;
        }
        nodes.push(parse_row(line_no, line)?);
    }
    if nodes.is_empty() {
        return Err(ParseError::NoCustomers);
    }

    debug!(
        name = %name,
        nodes = nodes.len(),
        vehicles = size,
        capacity,
        "parsed Solomon instance"
    );
    Ok(ProblemInstance::new(
        nodes,
        VehicleFleet::new(size, capacity as f64),
    )?)
}

/// Reads a Solomon instance from any reader.
pub fn read_solomon<R: Read>(mut reader: R) -> Result<ProblemInstance, ParseError> {
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    parse_solomon(&text)
}

/// Reads a Solomon instance file.
pub fn read_solomon_file(path: impl AsRef<Path>) -> Result<ProblemInstance, ParseError> {
    let text = fs::read_to_string(path)?;
    parse_solomon(&text)
}

/// Lists the regular files under `dir` and all its subdirectories, sorted
/// by path.
///
/// # Errors
///
/// [`ParseError::NotADirectory`] if `dir` is not a directory, or
/// [`ParseError::Io`] if a directory cannot be read.
pub fn list_instance_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, ParseError> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(ParseError::NotADirectory(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    files.sort();
    debug!(dir = %dir.display(), files = files.len(), "listed instance files");
    Ok(files)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ParseError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            collect_files(&entry.path(), files)?;
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    Ok(())
}

fn starts_with_digit(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn parse_vehicle_line(line: &str) -> Option<(usize, usize)> {
    let mut fields = line.split_whitespace();
    let size = fields.next()?.parse().ok()?;
    let capacity = fields.next()?.parse().ok()?;
    fields.next().is_none().then_some((size, capacity))
}

fn parse_row(line_no: usize, line: &str) -> Result<Node, ParseError> {
    let invalid = |reason: String| ParseError::InvalidRow {
        line: line_no,
        reason,
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != ROW_FIELDS {
        return Err(invalid(format!(
            "expected {ROW_FIELDS} fields, found {}",
            fields.len()
        )));
    }
    let id: usize = fields[0]
        .parse()
        .map_err(|_| invalid(format!("invalid node id `{}`", fields[0])))?;
    let mut values = [0.0; ROW_FIELDS - 1];
    for (value, field) in values.iter_mut().zip(&fields[1..]) {
        *value = field
            .parse()
            .map_err(|_| invalid(format!("invalid number `{field}`")))?;
    }
    let [x, y, demand, ready, due, service] = values;
    let window = TimeWindow::new(ready, due)
        .ok_or_else(|| invalid(format!("ready time {ready} is after due date {due}")))?;
    Ok(Node::new(id, x, y, demand, window, service))
}
