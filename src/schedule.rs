use std::num::NonZeroUsize;

use crate::grid::Configuration;

/// How many GPUs the machine has and how many tasks share each of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuLayout {
    gpus: NonZeroUsize,
    tasks_per_core: NonZeroUsize,
}

impl GpuLayout {
    pub fn new(gpus: NonZeroUsize, tasks_per_core: NonZeroUsize) -> Self {
        Self {
            gpus,
            tasks_per_core,
        }
    }

    pub fn gpus(&self) -> usize {
        self.gpus.get()
    }

    pub fn tasks_per_core(&self) -> usize {
        self.tasks_per_core.get()
    }

    /// The wave size, which is also the peak number of concurrent tasks.
    pub fn chunk_size(&self) -> NonZeroUsize {
        // Both factors are non-zero, so the product is too unless it overflows.
        self.gpus
            .checked_mul(self.tasks_per_core)
            .unwrap_or(NonZeroUsize::MAX)
    }

    /// Round-robin GPU for the task at `position` within its wave.
    ///
    /// Consecutive positions fill one GPU with `tasks_per_core` tasks before
    /// moving to the next, wrapping around after the last GPU.
    #[inline]
    pub fn gpu_for(&self, position: usize) -> usize {
        (position / self.tasks_per_core.get()) % self.gpus.get()
    }
}

/// A configuration bound to its slot in a wave.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Task {
    pub config: Configuration,
    /// 1-based position within the whole sweep, for progress counters.
    pub sequence: usize,
    pub gpu: usize,
}

/// A contiguous slice of the sweep that runs concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct Wave {
    index: usize,
    offset: usize,
    configs: Vec<Configuration>,
}

impl Wave {
    /// 0-based index of this wave.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn configs(&self) -> &[Configuration] {
        &self.configs
    }

    /// Binds every configuration of the wave to a GPU.
    pub fn tasks(&self, layout: &GpuLayout) -> Vec<Task> {
        self.configs
            .iter()
            .enumerate()
            .map(|(position, &config)| Task {
                config,
                sequence: self.offset + position + 1,
                gpu: layout.gpu_for(position),
            })
            .collect()
    }
}

/// Splits the sweep into `ceil(N / chunk_size)` waves, in order. Only the last
/// wave may be shorter than `chunk_size`.
///
/// # Args
/// * `configs` - The flat configuration list.
/// * `chunk_size` - The maximum wave length.
///
/// # Returns
/// The waves; empty if `configs` is empty.
pub fn partition(configs: &[Configuration], chunk_size: NonZeroUsize) -> Vec<Wave> {
    configs
        .chunks(chunk_size.get())
        .enumerate()
        .map(|(index, chunk)| Wave {
            index,
            offset: index * chunk_size.get(),
            configs: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::enumerate;

    fn layout(gpus: usize, tasks_per_core: usize) -> GpuLayout {
        GpuLayout::new(
            NonZeroUsize::new(gpus).unwrap(),
            NonZeroUsize::new(tasks_per_core).unwrap(),
        )
    }

    fn nz(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn round_robin_over_eight_gpus() {
        let layout = layout(8, 1);
        for position in 0..8 {
            assert_eq!(layout.gpu_for(position), position);
        }
        assert_eq!(layout.gpu_for(8), 0);
    }

    #[test]
    fn tasks_per_core_fills_each_gpu_first() {
        let layout = layout(2, 2);
        let gpus: Vec<_> = (0..4).map(|p| layout.gpu_for(p)).collect();
        assert_eq!(gpus, vec![0, 0, 1, 1]);
        assert_eq!(layout.chunk_size().get(), 4);
    }

    #[test]
    fn short_final_wave_is_prefix_of_full_assignment() {
        let layout = layout(2, 2);
        let configs = enumerate(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7], &[1]);
        let waves = partition(&configs, layout.chunk_size());

        assert_eq!(waves.len(), 2);
        let last: Vec<_> = waves[1].tasks(&layout).iter().map(|t| t.gpu).collect();
        assert_eq!(last, vec![0, 0, 1]);
    }

    #[test]
    fn wave_count_is_ceiling_division() {
        let configs = enumerate(&[0.1, 0.2, 0.3, 0.4, 0.5], &[1, 2]);
        for chunk in 1..=12 {
            let waves = partition(&configs, nz(chunk));
            assert_eq!(waves.len(), configs.len().div_ceil(chunk));
            assert!(waves.iter().all(|w| !w.is_empty() && w.len() <= chunk));
        }
    }

    #[test]
    fn concatenated_waves_reproduce_input() {
        let configs = enumerate(&[0.1, 0.2, 0.3], &[1, 2, 3]);
        let waves = partition(&configs, nz(4));

        let rebuilt: Vec<_> = waves.iter().flat_map(|w| w.configs().to_vec()).collect();
        assert_eq!(rebuilt, configs);
        assert_eq!(
            waves.iter().map(Wave::len).collect::<Vec<_>>(),
            vec![4, 4, 1]
        );
    }

    #[test]
    fn empty_input_has_no_waves() {
        assert!(partition(&[], nz(3)).is_empty());
    }

    #[test]
    fn sequence_numbers_continue_across_waves() {
        let layout = layout(2, 1);
        let configs = enumerate(&[0.01, 0.001, 0.0001], &[1, 2]);
        let waves = partition(&configs, layout.chunk_size());

        let sequences: Vec<_> = waves
            .iter()
            .flat_map(|w| w.tasks(&layout))
            .map(|t| t.sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn first_wave_of_reference_sweep() {
        let layout = layout(2, 1);
        let configs = enumerate(&[0.01, 0.001, 0.0001], &[1, 2]);
        let waves = partition(&configs, layout.chunk_size());

        assert_eq!(waves.len(), 3);
        let tasks = waves[0].tasks(&layout);
        assert_eq!(tasks[0].config, Configuration::new(1, 0.01));
        assert_eq!(tasks[0].gpu, 0);
        assert_eq!(tasks[1].config, Configuration::new(2, 0.01));
        assert_eq!(tasks[1].gpu, 1);
    }
}
