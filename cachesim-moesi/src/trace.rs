use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::error::{SimError, SimResult};
use crate::moesi::{Addr, CoreId, Instr, Insts};

/// default value stored by a write entry without an explicit value
pub fn stamp(core: CoreId, index: usize) -> u32 {
    ((core as u32) << 24) | (index as u32 & 0x00ff_ffff)
}

fn parse_hex(s: &str) -> Option<u32> {
    u32::from_str_radix(s.trim_start_matches("0x").trim_start_matches("0X"), 16).ok()
}

fn parse_line(core: CoreId, index: usize, line: &str) -> Option<Instr> {
    let mut parts = line.split_whitespace();
    let op = parts.next()?.parse::<u32>().ok()?;
    let val = parse_hex(parts.next()?)?;
    let extra = parts.next().map(parse_hex);
    match (op, extra) {
        (0, None) => Some(Instr::Read(Addr(val))),
        (1, None) => Some(Instr::Write(Addr(val), stamp(core, index))),
        (1, Some(Some(value))) => Some(Instr::Write(Addr(val), value)),
        (2, None) => Some(Instr::Other(val)),
        _ => None,
    }
}

/// Parse one core's trace.
///
/// Every line is `<op> <hex>` with op 0 = load, 1 = store, 2 = `<hex>` cycles of other
/// work. A store may carry the value to write as a third hex field. Blank lines and
/// `#` comments are ignored, malformed lines are skipped with a warning.
pub fn parse(core: CoreId, src: &str) -> Insts {
    let mut insts = Vec::new();
    for (lineno, line) in src.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_line(core, insts.len(), line) {
            Some(inst) => insts.push(inst),
            None => warn!("core {}: skipping malformed trace line {}: '{}'", core, lineno + 1, line),
        }
    }
    insts
}

/// Reads all files in `dir` named `<testname>*.data`, one per core in file name order.
pub fn read_testfiles(dir: &Path, testname: &str) -> SimResult<Vec<Insts>> {
    let mut paths = fs::read_dir(dir)
        .map_err(|e| SimError::TraceReadError(dir.to_path_buf(), e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(testname) && n.ends_with(".data"))
        })
        .collect::<Vec<_>>();
    paths.sort();
    if paths.is_empty() {
        return Err(SimError::NoTraces(testname.to_string()));
    }
    let mut insts = Vec::new();
    for (core, path) in paths.iter().enumerate() {
        info!("reading file: {:?}", path.file_name().unwrap_or_default());
        let src = fs::read_to_string(path).map_err(|e| SimError::TraceReadError(path.clone(), e))?;
        insts.push(parse(core, &src));
    }
    Ok(insts)
}
