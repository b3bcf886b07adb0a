use crate::model::{AddressItem, IpRange};
use std::net::Ipv4Addr;
use std::str::FromStr;
use tracing::debug;

/// Expand server-supplied ranges into the flat, ordered list of addresses
/// a job will probe.
///
/// Every address `start <= a <= end` is produced, ascending within a range,
/// ranges concatenated in input order. Incomplete or unparseable ranges are
/// skipped. Overlapping ranges are not deduplicated; duplicates are probed
/// independently.
pub fn expand_ranges(ranges: &[IpRange]) -> Vec<AddressItem> {
    let mut items = Vec::new();

    for range in ranges {
        let (Some(start_raw), Some(end_raw)) = (&range.ip_start, &range.ip_end) else {
            debug!("skipping range with missing endpoint: {:?}", range);
            continue;
        };

        let (start, end) = match (Ipv4Addr::from_str(start_raw), Ipv4Addr::from_str(end_raw)) {
            (Ok(s), Ok(e)) => (u32::from(s), u32::from(e)),
            _ => {
                debug!("skipping range with invalid endpoint: {start_raw} - {end_raw}");
                continue;
            }
        };

        if start > end {
            debug!("skipping inverted range: {start_raw} - {end_raw}");
            continue;
        }

        for value in start..=end {
            items.push(AddressItem {
                ip: Ipv4Addr::from(value).to_string(),
                entity: range.entity.clone(),
            });
        }
    }

    items
}
