// Groth16 proof generation.
//
// The proving backend is a collaborator: anything that turns a witness plus
// a compiled circuit into a proof and its public signals. The bundled
// implementation shells out to `snarkjs groth16 fullprove`, which reads the
// circuit wasm + zkey and writes `proof.json` / `public.json`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CircuitArtifact;
use crate::error::{ClientError, Result};
use crate::witness::WitnessInput;

/// Affine G1 point, coordinates as decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct G1Point {
    pub x: String,
    pub y: String,
}

/// Affine G2 point. Each coordinate is `[c0, c1]` (real part first), the
/// order snarkjs prints them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct G2Point {
    pub x: [String; 2],
    pub y: [String; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub a: G1Point,
    pub b: G2Point,
    pub c: G1Point,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProverOutput {
    pub proof: Groth16Proof,
    /// In the circuit's internal order.
    pub public_signals: Vec<String>,
}

#[allow(async_fn_in_trait)]
pub trait Prover {
    async fn prove(&self, witness: &WitnessInput, artifact: &CircuitArtifact) -> Result<ProverOutput>;
}

// snarkjs output, projective coordinates with a trailing "1".
#[derive(Deserialize)]
struct SnarkjsProof {
    pi_a: Vec<String>,
    pi_b: Vec<Vec<String>>,
    pi_c: Vec<String>,
}

fn g1(coords: &[String], name: &str) -> Result<G1Point> {
    match coords {
        [x, y, ..] => Ok(G1Point { x: x.clone(), y: y.clone() }),
        _ => Err(ClientError::ProofGenerationFailure(format!("{} has {} coordinates", name, coords.len()))),
    }
}

fn fp2(pair: &[String], name: &str) -> Result<[String; 2]> {
    match pair {
        [c0, c1] => Ok([c0.clone(), c1.clone()]),
        _ => Err(ClientError::ProofGenerationFailure(format!("{} is not an Fp2 pair", name))),
    }
}

/// Parses snarkjs' `proof.json` and `public.json`.
pub fn parse_snarkjs(proof_json: &str, public_json: &str) -> Result<ProverOutput> {
    let raw: SnarkjsProof = serde_json::from_str(proof_json)
        .map_err(|e| ClientError::ProofGenerationFailure(format!("proof.json: {}", e)))?;
    let public_signals: Vec<String> = serde_json::from_str(public_json)
        .map_err(|e| ClientError::ProofGenerationFailure(format!("public.json: {}", e)))?;

    if raw.pi_b.len() < 2 {
        return Err(ClientError::ProofGenerationFailure("pi_b has fewer than two rows".into()));
    }
    let proof = Groth16Proof {
        a: g1(&raw.pi_a, "pi_a")?,
        b: G2Point { x: fp2(&raw.pi_b[0], "pi_b.x")?, y: fp2(&raw.pi_b[1], "pi_b.y")? },
        c: g1(&raw.pi_c, "pi_c")?,
    };
    Ok(ProverOutput { proof, public_signals })
}

/// Runs the snarkjs CLI.
pub struct SnarkjsProver {
    bin: String,
    work_dir: PathBuf,
}

impl SnarkjsProver {
    pub fn new(bin: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into(), work_dir: work_dir.into() }
    }

    async fn run(&self, dir: &Path, witness: &WitnessInput, artifact: &CircuitArtifact) -> Result<ProverOutput> {
        let input = dir.join("input.json");
        let proof = dir.join("proof.json");
        let public = dir.join("public.json");
        tokio::fs::write(&input, witness.to_json()?).await?;

        let output = Command::new(&self.bin)
            .arg("groth16")
            .arg("fullprove")
            .arg(&input)
            .arg(&artifact.wasm)
            .arg(&artifact.zkey)
            .arg(&proof)
            .arg(&public)
            .output()
            .await
            .map_err(|e| ClientError::ProofGenerationFailure(format!("could not start {}: {}", self.bin, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClientError::ProofGenerationFailure(format!(
                "{} exited with {}: {}",
                self.bin,
                output.status,
                stderr.trim()
            )));
        }

        let proof_json = tokio::fs::read_to_string(&proof).await?;
        let public_json = tokio::fs::read_to_string(&public).await?;
        parse_snarkjs(&proof_json, &public_json)
    }
}

impl Prover for SnarkjsProver {
    async fn prove(&self, witness: &WitnessInput, artifact: &CircuitArtifact) -> Result<ProverOutput> {
        let dir = self.work_dir.join(format!("proof-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await?;
        info!(kind = ?witness.kind(), wasm = %artifact.wasm.display(), "running snarkjs prover");

        let result = self.run(&dir, witness, artifact).await;

        // The directory holds the witness, which contains the secret.
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            warn!(dir = %dir.display(), error = %e, "could not remove prover scratch directory");
        }

        let output = result?;
        if output.public_signals != witness.claimed_signals() {
            return Err(ClientError::ProofGenerationFailure(
                "prover public signals differ from the witness claim".into(),
            ));
        }
        debug!(signals = output.public_signals.len(), "proof generated");
        Ok(output)
    }
}

/// Echoes the witness' claimed public signals under a fixed placeholder
/// proof. Only a ledger that skips the pairing check accepts its output;
/// used for offline play against `LocalLedger`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DevProver;

impl DevProver {
    pub fn placeholder_proof() -> Groth16Proof {
        let p = |x: &str, y: &str| G1Point { x: x.into(), y: y.into() };
        Groth16Proof {
            a: p("1", "2"),
            b: G2Point { x: ["1".into(), "0".into()], y: ["1".into(), "0".into()] },
            c: p("1", "2"),
        }
    }
}

impl Prover for DevProver {
    async fn prove(&self, witness: &WitnessInput, _artifact: &CircuitArtifact) -> Result<ProverOutput> {
        warn!(kind = ?witness.kind(), "dev prover in use, proof is a placeholder");
        Ok(ProverOutput { proof: Self::placeholder_proof(), public_signals: witness.claimed_signals() })
    }
}
