use std::fs;
use std::path::Path;

use farword::embeddings::loader::{
    MATRIX_FILE, META_FILE, PREFERRED_SET, SAMPLE_SET, TOKENS_FILE, VECTORS_FILE,
};
use farword::embeddings::{SetMeta, TableError, VectorFormat, load_set, load_table};
use tempfile::TempDir;

fn write_tokens(dir: &Path, tokens: &[String]) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(TOKENS_FILE), serde_json::to_vec(tokens).unwrap()).unwrap();
}

fn write_plain_set(dir: &Path, tokens: &[String], matrix: &[Vec<f32>]) {
    write_tokens(dir, tokens);
    fs::write(dir.join(MATRIX_FILE), serde_json::to_vec(matrix).unwrap()).unwrap();
}

fn write_packed_set(dir: &Path, tokens: &[String], dims: usize, components: &[f32]) {
    write_tokens(dir, tokens);
    let mut blob = Vec::with_capacity(components.len() * 4);
    for c in components {
        blob.extend_from_slice(&c.to_le_bytes());
    }
    fs::write(dir.join(VECTORS_FILE), blob).unwrap();
    let meta = SetMeta {
        dims,
        count: tokens.len(),
        format: VectorFormat::Fp32,
    };
    fs::write(dir.join(META_FILE), serde_json::to_vec(&meta).unwrap()).unwrap();
}

/// Pseudo-random but deterministic fixture data.
fn fixture_matrix(rows: usize, dims: usize) -> Vec<Vec<f32>> {
    (0..rows)
        .map(|r| {
            (0..dims)
                .map(|c| ((r * 31 + c * 7) % 17) as f32 / 4.0 - 2.0)
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn packed_and_plain_encodings_agree() {
    let tokens: Vec<String> = (0..40).map(|i| format!("word{i}")).collect();
    let matrix = fixture_matrix(tokens.len(), 12);
    let flat: Vec<f32> = matrix.iter().flatten().copied().collect();

    let tmp = TempDir::new().unwrap();
    let plain_dir = tmp.path().join("plain");
    let packed_dir = tmp.path().join("packed");
    write_plain_set(&plain_dir, &tokens, &matrix);
    write_packed_set(&packed_dir, &tokens, 12, &flat);

    let plain = load_set(&plain_dir).await.unwrap();
    let packed = load_set(&packed_dir).await.unwrap();

    assert_eq!(plain.len(), packed.len());
    assert_eq!(plain.dims(), packed.dims());
    for row in 0..plain.len() {
        assert_eq!(plain.token(row), packed.token(row));
        let a = plain.row(row).unwrap();
        let b = packed.row(row).unwrap();
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-6, "row {row}: {x} vs {y}");
        }
    }
}

#[tokio::test]
async fn large_packed_set_decodes_every_component() {
    let tokens: Vec<String> = (0..5000).map(|i| format!("w{i}")).collect();
    let components = vec![0.25f32; 5000 * 50];

    let tmp = TempDir::new().unwrap();
    write_packed_set(tmp.path(), &tokens, 50, &components);

    let table = load_set(tmp.path()).await.unwrap();
    assert_eq!(table.len(), 5000);
    assert_eq!(table.dims(), 50);
    assert_eq!(table.row(4999).unwrap().len(), 50);
    assert_eq!(table.row(4999).unwrap()[49], 0.25);
}

#[tokio::test]
async fn dims_disagreeing_with_blob_length_is_malformed() {
    let tokens: Vec<String> = (0..3).map(|i| format!("w{i}")).collect();
    let tmp = TempDir::new().unwrap();
    write_packed_set(tmp.path(), &tokens, 4, &[0.0; 12]);
    // 12 components with dims=5 leaves a partial row.
    let meta = SetMeta {
        dims: 5,
        count: 3,
        format: VectorFormat::Fp32,
    };
    fs::write(
        tmp.path().join(META_FILE),
        serde_json::to_vec(&meta).unwrap(),
    )
    .unwrap();

    let err = load_set(tmp.path()).await.unwrap_err();
    assert!(matches!(err, TableError::Malformed { .. }), "{err}");
}

#[tokio::test]
async fn count_disagreeing_with_token_list_is_malformed() {
    let tokens: Vec<String> = (0..3).map(|i| format!("w{i}")).collect();
    let tmp = TempDir::new().unwrap();
    write_packed_set(tmp.path(), &tokens, 4, &[0.0; 12]);
    let meta = SetMeta {
        dims: 4,
        count: 4,
        format: VectorFormat::Fp32,
    };
    fs::write(
        tmp.path().join(META_FILE),
        serde_json::to_vec(&meta).unwrap(),
    )
    .unwrap();

    let err = load_set(tmp.path()).await.unwrap_err();
    assert!(matches!(err, TableError::Malformed { .. }), "{err}");
}

#[tokio::test]
async fn sample_set_is_used_when_no_preferred_metadata_exists() {
    let tmp = TempDir::new().unwrap();
    write_plain_set(
        &tmp.path().join(SAMPLE_SET),
        &["only".to_string()],
        &[vec![1.0, 2.0]],
    );
    let table = load_table(tmp.path()).await.unwrap();
    assert_eq!(table.token(0), Some("only"));
}

#[tokio::test]
async fn preferred_set_outranks_sample_set() {
    let tmp = TempDir::new().unwrap();
    write_packed_set(
        &tmp.path().join(PREFERRED_SET),
        &["hi".to_string()],
        2,
        &[1.0, 0.0],
    );
    write_plain_set(
        &tmp.path().join(SAMPLE_SET),
        &["lo".to_string()],
        &[vec![0.0, 1.0]],
    );
    let table = load_table(tmp.path()).await.unwrap();
    assert_eq!(table.token(0), Some("hi"));
}

#[tokio::test]
async fn corrupt_preferred_set_falls_back_then_exhausts() {
    let tmp = TempDir::new().unwrap();
    let preferred = tmp.path().join(PREFERRED_SET);
    write_packed_set(&preferred, &["hi".to_string()], 2, &[1.0, 0.0]);
    fs::write(preferred.join(VECTORS_FILE), b"oops").unwrap();

    // With a good sample set the corruption is recoverable.
    write_plain_set(
        &tmp.path().join(SAMPLE_SET),
        &["lo".to_string()],
        &[vec![0.0, 1.0]],
    );
    let table = load_table(tmp.path()).await.unwrap();
    assert_eq!(table.token(0), Some("lo"));

    // Without one, the load is terminal.
    let lone = TempDir::new().unwrap();
    let preferred = lone.path().join(PREFERRED_SET);
    write_packed_set(&preferred, &["hi".to_string()], 2, &[1.0, 0.0]);
    fs::write(preferred.join(VECTORS_FILE), b"oops").unwrap();
    let err = load_table(lone.path()).await.unwrap_err();
    assert!(matches!(err, TableError::Unavailable { .. }), "{err}");
}
