//! Durable artifact storage
//!
//! Every artifact is one file under the store root, written as a bincode
//! envelope recording the artifact kind, the format version and a blake3
//! digest of the payload. Loads verify all three before decoding, so a
//! truncated or mislabelled file surfaces as [`SalesError::ArtifactCorrupted`]
//! instead of a half-decoded value. Saves overwrite; there is no versioning.

use crate::errors::{Result, SalesError};
use crate::feature_engineering::DerivedFeatureStats;
use crate::model::{ModelFamily, TrainedModel};
use crate::preprocessor::CompositePreprocessor;
use crate::serialization::{read_json, to_canonical_json};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Artifact name of the fitted preprocessor
pub const PREPROCESSOR: &str = "preprocessor";
/// Artifact name of the derived-feature statistics
pub const DERIVED_FEATURES: &str = "derived_features";

const ARTIFACT_EXT: &str = "artifact";
const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Envelope {
    kind: String,
    format_version: u32,
    payload_hash: String,
    payload: Vec<u8>,
}

/// Outcome of a save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Hex blake3 digest of the payload
    pub payload_hash: String,
}

/// Directory-backed store of named artifacts
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist the preprocessor, the derived-feature statistics and every
    /// model, each as an independently loadable artifact
    ///
    /// The saved set replaces the previous one: model artifacts of families
    /// absent from `models` are removed, since they were fitted against a
    /// different preprocessor.
    #[instrument(skip_all, fields(root = %self.root.display(), models = models.len()))]
    pub fn save(
        &self,
        preprocessor: &CompositePreprocessor,
        derived: &DerivedFeatureStats,
        models: &[TrainedModel],
    ) -> Result<Vec<SavedArtifact>> {
        let mut saved = Vec::with_capacity(models.len() + 2);
        saved.push(self.save_preprocessor(preprocessor)?);
        saved.push(self.save_derived_features(derived)?);
        for model in models {
            saved.push(self.save_model(model)?);
        }
        for family in ModelFamily::ALL {
            if !models.iter().any(|m| m.family == family) && self.remove_model(family)? {
                info!("Removed stale {} model", family);
            }
        }
        info!(
            "Saved {} artifacts ({} bytes)",
            saved.len(),
            saved.iter().map(|a| a.size_bytes).sum::<u64>()
        );
        Ok(saved)
    }

    pub fn save_preprocessor(&self, preprocessor: &CompositePreprocessor) -> Result<SavedArtifact> {
        if !preprocessor.is_fitted() {
            return Err(SalesError::NotFitted);
        }
        self.save_artifact(PREPROCESSOR, preprocessor)
    }

    pub fn load_preprocessor(&self) -> Result<CompositePreprocessor> {
        self.load_artifact(PREPROCESSOR)
    }

    pub fn save_derived_features(&self, derived: &DerivedFeatureStats) -> Result<SavedArtifact> {
        self.save_artifact(DERIVED_FEATURES, derived)
    }

    pub fn load_derived_features(&self) -> Result<DerivedFeatureStats> {
        self.load_artifact(DERIVED_FEATURES)
    }

    pub fn save_model(&self, model: &TrainedModel) -> Result<SavedArtifact> {
        model.ensemble.validate()?;
        self.save_artifact(&model.family.artifact_name(), model)
    }

    pub fn load_model(&self, family: ModelFamily) -> Result<TrainedModel> {
        let model: TrainedModel = self.load_artifact(&family.artifact_name())?;
        if model.family != family {
            return Err(SalesError::ArtifactCorrupted {
                name: family.artifact_name(),
                reason: format!("holds a {} model", model.family),
            });
        }
        Ok(model)
    }

    /// Delete the model artifact of `family`; `false` if there was none
    pub fn remove_model(&self, family: ModelFamily) -> Result<bool> {
        match fs::remove_file(self.artifact_path(&family.artifact_name())) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Families with a persisted model, in training order
    pub fn list_models(&self) -> Vec<ModelFamily> {
        ModelFamily::ALL
            .into_iter()
            .filter(|family| self.contains(&family.artifact_name()))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.artifact_path(name).is_file()
    }

    /// Encode `value` into a named artifact, replacing any previous one
    #[instrument(skip(self, value))]
    pub fn save_artifact<T: Serialize>(&self, name: &str, value: &T) -> Result<SavedArtifact> {
        check_name(name)?;
        let payload = bincode::serialize(value)?;
        let payload_hash = blake3::hash(&payload).to_hex().to_string();
        let envelope = Envelope {
            kind: name.to_string(),
            format_version: FORMAT_VERSION,
            payload_hash: payload_hash.clone(),
            payload,
        };
        let bytes = bincode::serialize(&envelope)?;

        let path = self.artifact_path(name);
        write_replacing(&path, &bytes)?;
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());

        Ok(SavedArtifact {
            name: name.to_string(),
            path,
            size_bytes: bytes.len() as u64,
            payload_hash,
        })
    }

    /// Decode a named artifact after verifying its envelope
    #[instrument(skip(self))]
    pub fn load_artifact<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        check_name(name)?;
        let path = self.artifact_path(name);
        let bytes = read_existing(&path, name)?;

        let corrupted = |reason: String| SalesError::ArtifactCorrupted {
            name: name.to_string(),
            reason,
        };
        let envelope: Envelope =
            bincode::deserialize(&bytes).map_err(|e| corrupted(format!("bad envelope: {e}")))?;
        if envelope.kind != name {
            return Err(corrupted(format!("artifact kind is {}", envelope.kind)));
        }
        if envelope.format_version != FORMAT_VERSION {
            return Err(corrupted(format!(
                "unsupported format version {}",
                envelope.format_version
            )));
        }
        let actual = blake3::hash(&envelope.payload).to_hex().to_string();
        if actual != envelope.payload_hash {
            return Err(corrupted("payload hash mismatch".into()));
        }

        bincode::deserialize(&envelope.payload).map_err(|e| corrupted(format!("bad payload: {e}")))
    }

    /// Write `value` as canonical JSON to `<name>.json`
    pub fn save_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        check_name(name)?;
        let path = self.json_path(name);
        write_replacing(&path, &to_canonical_json(value)?)?;
        Ok(path)
    }

    pub fn load_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        check_name(name)?;
        let path = self.json_path(name);
        let bytes = read_existing(&path, name)?;
        Ok(read_json(bytes.as_slice())?)
    }

    fn artifact_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{ARTIFACT_EXT}"))
    }

    fn json_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }
}

/// Artifact names become file names: lowercase ASCII, digits and `_` only.
fn check_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if valid {
        Ok(())
    } else {
        Err(SalesError::InvalidParameters(format!(
            "invalid artifact name: {name:?}"
        )))
    }
}

/// Write through a sibling temp file so readers never see a partial artifact
fn write_replacing(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_existing(path: &Path, name: &str) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SalesError::ArtifactNotFound(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Blob {
        values: Vec<f64>,
    }

    fn store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::open(dir.path().join("artifacts")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_save_then_load() {
        let (_dir, store) = store();
        let blob = Blob {
            values: vec![1.0, 2.5],
        };
        let saved = store.save_artifact("blob", &blob).unwrap();
        assert_eq!(saved.payload_hash.len(), 64);
        assert!(store.contains("blob"));
        assert_eq!(store.load_artifact::<Blob>("blob").unwrap(), blob);
    }

    #[test]
    fn test_missing_artifact() {
        let (_dir, store) = store();
        assert!(matches!(
            store.load_artifact::<Blob>("nothing"),
            Err(SalesError::ArtifactNotFound(name)) if name == "nothing"
        ));
        assert!(matches!(
            store.load_model(ModelFamily::Gbdt),
            Err(SalesError::ArtifactNotFound(_))
        ));
        assert!(store.list_models().is_empty());
    }

    #[test]
    fn test_tampered_artifact_is_corrupted() {
        let (_dir, store) = store();
        let saved = store
            .save_artifact("blob", &Blob { values: vec![3.0; 8] })
            .unwrap();
        let mut bytes = fs::read(&saved.path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&saved.path, bytes).unwrap();

        assert!(matches!(
            store.load_artifact::<Blob>("blob"),
            Err(SalesError::ArtifactCorrupted { .. })
        ));
    }

    #[test]
    fn test_renamed_artifact_is_corrupted() {
        let (_dir, store) = store();
        let saved = store.save_artifact("first", &Blob { values: vec![] }).unwrap();
        fs::copy(&saved.path, store.root().join("second.artifact")).unwrap();
        assert!(matches!(
            store.load_artifact::<Blob>("second"),
            Err(SalesError::ArtifactCorrupted { .. })
        ));
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let (_dir, store) = store();
        assert!(store.save_artifact("../escape", &Blob { values: vec![] }).is_err());
        assert!(store.save_artifact("", &Blob { values: vec![] }).is_err());
    }

    #[test]
    fn test_unfitted_preprocessor_is_not_saved() {
        let (_dir, store) = store();
        let pre = CompositePreprocessor::new(Default::default());
        assert!(matches!(
            store.save_preprocessor(&pre),
            Err(SalesError::NotFitted)
        ));
    }

    #[test]
    fn test_json_report_round_trip() {
        let (_dir, store) = store();
        let path = store.save_json("report", &Blob { values: vec![0.5] }).unwrap();
        assert!(path.ends_with("report.json"));
        assert_eq!(
            store.load_json::<Blob>("report").unwrap(),
            Blob { values: vec![0.5] }
        );
    }
}
