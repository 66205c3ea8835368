use crate::axis::{Axis, AxisKind};
use crate::error::{Error, Result};
use crate::grid::{CellProperties, GridReader};
use crate::grid_source::{GridSource, ScaleMissing};
use log::debug;

/// One file's worth of gridded data in a time series: something that can be
/// opened as a `GridReader`, identified by a label (the original keys its
/// reader pool by filename; here any stable identifier works) and ordered
/// by its source date.
struct Entry<S> {
    label: String,
    source: S,
    date: f64,
}

/// An ordered series of same-shaped grids, bracketed in time, with a small
/// pool of opened `GridReader`s recycled across successive `load` calls so
/// a file already in memory from the last window isn't reopened.
///
/// Mirrors `original_source/src/lib/time_serie.cpp`'s `TimeSerie`.
pub struct TimeSeries<S: GridSource> {
    entries: Vec<Entry<S>>,
    time_axis: Axis,
    variable: String,
    scale_missing: ScaleMissing,
    readers: Vec<(String, GridReader)>,
}

impl<S: GridSource> TimeSeries<S> {
    /// Builds a series from `sources`, each paired with a stable label
    /// (standing in for a filename). Sources are sorted by their own
    /// reported date, and a time `Axis` is built from those dates.
    pub fn new(labeled_sources: Vec<(String, S)>, variable: impl Into<String>, scale_missing: ScaleMissing) -> Result<Self> {
        let mut entries = Vec::with_capacity(labeled_sources.len());
        for (label, source) in labeled_sources {
            let date = source.date()?;
            entries.push(Entry { label, source, date });
        }
        entries.sort_by(|a, b| a.date.partial_cmp(&b.date).expect("non-NaN dates"));
        let dates: Vec<f64> = entries.iter().map(|e| e.date).collect();
        let time_axis = Axis::new(dates, AxisKind::Time, "days")?;
        Ok(Self { entries, time_axis, variable: variable.into(), scale_missing, readers: Vec::new() })
    }

    pub fn start_date(&self) -> f64 {
        self.time_axis.value(0)
    }

    pub fn end_date(&self) -> f64 {
        self.time_axis.value(self.time_axis.len() - 1)
    }

    /// Ensures readers covering the window `[t0, t1]` are loaded, recycling
    /// any already-open reader whose label still appears in the needed
    /// range instead of reopening it.
    pub fn load(&mut self, t0: f64, t1: f64) -> Result<()> {
        let (i0, _) = self
            .time_axis
            .find_indexes(t0)
            .ok_or(Error::DateOutOfRange(t0))?;
        let (_, i1) = self
            .time_axis
            .find_indexes(t1)
            .ok_or(Error::DateOutOfRange(t1))?;
        let (lo, hi) = (i0.min(i1), i0.max(i1));

        let mut recycled: Vec<(String, GridReader)> = Vec::with_capacity(hi - lo + 1);
        for index in lo..=hi {
            let label = &self.entries[index].label;
            if let Some(pos) = self.readers.iter().position(|(l, _)| l == label) {
                recycled.push(self.readers.remove(pos));
            } else {
                debug!("loading '{label}' into the time series reader pool");
                let source = &self.entries[index].source;
                let mut reader = GridReader::open(source)?;
                reader.load(source, &self.variable, self.scale_missing)?;
                recycled.push((label.clone(), reader));
            }
        }
        self.readers = recycled;
        Ok(())
    }

    fn reader_for_index(&self, index: usize) -> &GridReader {
        let label = &self.entries[index].label;
        &self.readers.iter().find(|(l, _)| l == label).expect("load() covers the bracket").1
    }

    /// Time-weighted linear interpolation between the two grids bracketing
    /// `date`, each itself bilinearly interpolated in space. `cell0`/`cell1`
    /// are independent spatial caches for the two bracketing readers.
    pub fn interpolate(
        &self,
        date: f64,
        longitude: f64,
        latitude: f64,
        fill_value: f64,
        cell0: &mut CellProperties,
        cell1: &mut CellProperties,
    ) -> Result<f64> {
        let (i0, i1) = self
            .time_axis
            .find_indexes(date)
            .ok_or(Error::DateOutOfRange(date))?;
        if i0 == i1 {
            return self.reader_for_index(i0).interpolate(longitude, latitude, fill_value, cell0);
        }
        let t0 = self.time_axis.value(i0);
        let t1 = self.time_axis.value(i1);
        let dx = 1.0 / (t1 - t0);
        let x0 = self.reader_for_index(i0).interpolate(longitude, latitude, fill_value, cell0)?;
        let x1 = self.reader_for_index(i1).interpolate(longitude, latitude, fill_value, cell1)?;
        let w0 = (t1 - date) * dx;
        let w1 = (date - t0) * dx;
        Ok((w0 * x0 + w1 * x1) / (w0 + w1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::AxisKind as Kind;
    use crate::grid_source::{AxisDescriptor, InMemoryGridSource};

    fn source_at(date: f64, value: f64) -> InMemoryGridSource {
        let x = AxisDescriptor { points: vec![0.0, 1.0], kind: Kind::Longitude, unit: "degrees_east".into() };
        let y = AxisDescriptor { points: vec![0.0, 1.0], kind: Kind::Latitude, unit: "degrees_north".into() };
        InMemoryGridSource::new(x, y, date).with_variable("u", vec![value; 4])
    }

    fn series() -> TimeSeries<InMemoryGridSource> {
        let sources = vec![
            ("a".to_string(), source_at(0.0, 0.0)),
            ("b".to_string(), source_at(1.0, 10.0)),
            ("c".to_string(), source_at(2.0, 20.0)),
        ];
        TimeSeries::new(sources, "u", ScaleMissing::default()).unwrap()
    }

    #[test]
    fn interpolates_in_time_between_bracketing_grids() {
        let mut ts = series();
        ts.load(0.0, 2.0).unwrap();
        let mut c0 = CellProperties::default();
        let mut c1 = CellProperties::default();
        let v = ts.interpolate(0.5, 0.5, 0.5, -999.0, &mut c0, &mut c1).unwrap();
        assert!((v - 5.0).abs() < 1e-9);
    }

    #[test]
    fn date_out_of_range_errors() {
        let mut ts = series();
        assert!(ts.load(-5.0, -1.0).is_err());
    }

    #[test]
    fn reloading_overlapping_window_recycles_readers() {
        let mut ts = series();
        ts.load(0.0, 1.0).unwrap();
        ts.load(0.5, 1.5).unwrap();
        assert_eq!(ts.readers.len(), 2);
    }
}
