//! Range transcoding: one forward pass over a key range, re-encoding every
//! record into the target through a [`BatchWriter`].

use archmig_core::{ArchmigResult, KeyRange};
use archmig_storage::{SourceStore, TargetStore};

use crate::batch::{BatchWriter, TranscodeOptions, TranscodeStats};

/// Re-encode every record of `source` in `range` into `target`.
///
/// Any transform or commit error aborts the pass immediately. Batches already
/// committed stay in the target; since writes overwrite by key, running the
/// same pass again is safe.
pub fn transcode<S, T, F>(
    source: &S,
    target: &T,
    range: &KeyRange,
    options: &TranscodeOptions,
    label: &'static str,
    mut transform: F,
) -> ArchmigResult<TranscodeStats>
where
    S: SourceStore,
    T: TargetStore,
    F: FnMut(&[u8], &[u8]) -> ArchmigResult<(Vec<u8>, Vec<u8>)>,
{
    let mut writer = BatchWriter::new(target, options, label);
    let mut scanned = 0u64;
    source.scan(range, |key, value| {
        scanned += 1;
        let (new_key, new_value) = transform(key, value)?;
        writer.stage(new_key, new_value)
    })?;

    let mut stats = writer.finish()?;
    stats.scanned = scanned;
    Ok(stats)
}

/// Copy the record unchanged.
pub fn identity(key: &[u8], value: &[u8]) -> ArchmigResult<(Vec<u8>, Vec<u8>)> {
    Ok((key.to_vec(), value.to_vec()))
}
