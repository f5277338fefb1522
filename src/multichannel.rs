/*! Independent notch filters for several channels.

A receiver fed from more than one band (or more than one antenna) has
one sample stream per channel. Each channel gets its own [`NotchLite`],
with its own noise floor, counters and notch. Nothing is shared, so
the channels can be processed in parallel.
*/
use log::debug;
use rayon::prelude::*;

use crate::notch::{NotchConfig, NotchLite};
use crate::{Complex, Error, Result};

/// A set of independent notch filters, one per channel.
pub struct MultiChannelNotch {
    channels: Vec<NotchLite>,
}

impl MultiChannelNotch {
    /// Create `channels` independent notch filters, all with the same
    /// config.
    pub fn new(config: &NotchConfig, channels: usize) -> Result<Self> {
        if channels == 0 {
            return Err(Error::config("need at least one channel"));
        }
        let channels = (0..channels)
            .map(|_| NotchLite::new(config))
            .collect::<Result<Vec<_>>>()?;
        debug!("MultiChannelNotch: {} channels", channels.len());
        Ok(Self { channels })
    }

    /// Number of channels.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// Access one channel's filter.
    #[must_use]
    pub fn channel(&self, n: usize) -> Option<&NotchLite> {
        self.channels.get(n)
    }

    /** Process as many whole segments as fit, on every channel.

    Each input has one look-back sample first, as for
    [`NotchLite::general_work`]. Returns the number of items consumed
    and produced per channel.
    */
    pub fn general_work(
        &mut self,
        inputs: &[&[Complex]],
        outputs: &mut [&mut [Complex]],
    ) -> Result<Vec<usize>> {
        if inputs.len() != self.channels.len() || outputs.len() != self.channels.len() {
            return Err(Error::Stream(format!(
                "have {} channels, got {} inputs and {} outputs",
                self.channels.len(),
                inputs.len(),
                outputs.len()
            )));
        }
        Ok(self
            .channels
            .par_iter_mut()
            .zip(inputs.par_iter())
            .zip(outputs.par_iter_mut())
            .map(|((notch, input), output)| notch.general_work(input, output))
            .collect())
    }
}
