use foundation::time::Year;

pub struct TemporalAnalysis;

impl TemporalAnalysis {
    /// Item dated exactly `year`, else the one with the smallest distance.
    ///
    /// Ties go to the earliest item in slice order. Items whose date cannot be
    /// read are ignored.
    pub fn nearest<T, F>(items: &[T], year: Year, date_of: F) -> Option<&T>
    where
        F: Fn(&T) -> Option<Year>,
    {
        let mut best: Option<(&T, u32)> = None;
        for item in items {
            let Some(d) = date_of(item) else {
                continue;
            };
            let dist = d.distance(year);
            if dist == 0 {
                return Some(item);
            }
            if best.is_none_or(|(_, b)| dist < b) {
                best = Some((item, dist));
            }
        }
        best.map(|(item, _)| item)
    }
}
