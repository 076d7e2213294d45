//! Output verification against the locally computed ground truth.

use std::collections::BTreeMap;
use std::path::Path;

use crate::container::ContainerReader;
use crate::error::{TcError, TcResult};
use crate::model::{Record, VerifyReport};

/// Read the worker's output container and assert every `(key, value)`
/// record against `ground_truth`.
///
/// The check is asymmetric: each output record must match ground truth,
/// but ground-truth keys absent from the output are not an error. Callers
/// needing totality can compare `records_checked` to the ground-truth
/// size themselves.
pub fn verify_output(
    path: &Path,
    ground_truth: &BTreeMap<String, u64>,
) -> TcResult<VerifyReport> {
    if !path.exists() {
        return Err(TcError::MissingArtifact(path.to_path_buf()));
    }

    let reader = ContainerReader::open(path)?;
    let mut records_checked = 0usize;
    for record in reader {
        let Record::Pair { key, value } = record? else {
            return Err(TcError::corrupt(
                path,
                "output record is not a (key, value) pair",
            ));
        };

        let expected = ground_truth.get(&key).copied();
        let matches = expected.is_some_and(|count| i64::try_from(count) == Ok(value));
        if !matches {
            return Err(TcError::VerificationMismatch {
                key,
                expected,
                actual: value,
            });
        }
        records_checked += 1;
    }

    tracing::debug!(path = %path.display(), records_checked, "output verified");
    Ok(VerifyReport { records_checked })
}
