//! Fixed-width text table output.

use crate::delta::PoolRates;
use std::io::{self, Write};

/// Column titles, in row order.
pub const COLUMNS: [&str; 7] = [
    "name",
    "wr. IOPS",
    "wr. MiBps",
    "rd. IOPS",
    "rd. MiBps",
    "+objs/s",
    "+MiB/s",
];

/// Write one table block: header, one row per pool, then a blank line.
///
/// The header is repeated on every call so that each block stands alone in a
/// scrolling terminal or a captured log.
pub fn render_table<W: Write>(out: &mut W, rows: &[PoolRates]) -> io::Result<()> {
    let [name, wr_ops, wr_mib, rd_ops, rd_mib, objs, size] = COLUMNS;
    writeln!(
        out,
        "{name:>30}    {wr_ops:>10}  {wr_mib:>10}  {rd_ops:>10}  {rd_mib:>10}  {objs:>10}  {size:>10}"
    )?;

    for row in rows {
        writeln!(
            out,
            "{:>30}    {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}",
            row.name,
            row.write_ops,
            row.write_mib,
            row.read_ops,
            row.read_mib,
            row.objects,
            row.size_mib,
        )?;
    }

    writeln!(out)?;
    out.flush()
}
