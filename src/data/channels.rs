use log::warn;

use super::model::{Channel, Recording};
use crate::config::ChannelMap;
use crate::error::{Error, Result};

/// Slice the mapped electrode columns out of a recording, in map order.
///
/// Fails before reading anything if the recording is narrower than the
/// map requires. Non-finite samples are zeroed so a single dropout does not
/// poison the whole spectrogram.
pub fn select_channels(recording: &Recording, map: &ChannelMap) -> Result<Vec<Channel>> {
    let available = recording.n_variables();
    if let Some((index, name)) = map.entries().find(|&(i, _)| i >= available) {
        return Err(Error::MissingColumn {
            channel: name.to_string(),
            index,
            available,
        });
    }

    Ok(map
        .entries()
        .map(|(index, name)| {
            let mut bad = 0usize;
            let samples: Vec<f64> = recording
                .column(index)
                .iter()
                .map(|&v| {
                    if v.is_finite() {
                        v
                    } else {
                        bad += 1;
                        0.0
                    }
                })
                .collect();
            if bad > 0 {
                warn!(
                    "{}: channel {name} had {bad} non-finite samples, replaced with 0",
                    recording.path.display()
                );
            }
            Channel {
                name: name.to_string(),
                samples,
            }
        })
        .collect())
}
