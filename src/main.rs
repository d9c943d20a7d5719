use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use heathcliff_infer::{
    app::{
        dataset::read_labels, ArtifactKind, ArtifactStore, BatchOrchestrator, BiasCircuit,
        CircuitEvaluator, DatasetLoader, DirectoryRoot, FsArtifactStore, IdentityCircuit,
        InstanceParams, InstanceSize, LoadMode, Sample,
    },
    EncryptionParameters, HeContext,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "heathcliff-infer", about = "Two-party encrypted inference stages")]
struct Cli {
    /// Directory holding the io/ and datasets/ trees.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Maximum number of batch items processed at once.
    #[arg(long, global = true, default_value_t = 1)]
    max_in_flight: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct Instance {
    /// Instance size: 0-SINGLE, 1-SMALL, 2-MEDIUM, 3-LARGE.
    #[arg(value_parser = parse_size)]
    size: InstanceSize,

    /// Process only the first COUNT items of the batch.
    #[arg(long)]
    count: Option<usize>,
}

#[derive(Args)]
struct DatasetArgs {
    /// Combined `<label> <pixels>` file. Defaults to datasets/<tier>/dataset.txt.
    #[arg(long, conflicts_with_all = ["pixels", "labels"])]
    dataset: Option<PathBuf>,

    /// Pixel file of a split dataset, one image per line.
    #[arg(long, requires = "labels")]
    pixels: Option<PathBuf>,

    /// Label file of a split dataset, one label per line.
    #[arg(long, requires = "pixels")]
    labels: Option<PathBuf>,

    /// Fail on the first malformed record instead of stopping there.
    #[arg(long)]
    strict: bool,
}

#[derive(Args)]
struct CircuitArgs {
    /// Comma separated bias added to the score slots; identity circuit if absent.
    #[arg(long, value_delimiter = ',')]
    bias: Option<Vec<f64>>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate parameters and keys.
    Keygen {
        #[command(flatten)]
        instance: Instance,
    },
    /// Client: encode and encrypt the batch inputs.
    Encrypt {
        #[command(flatten)]
        instance: Instance,
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Only report how many inputs would be encrypted.
        #[arg(long)]
        count_only: bool,
    },
    /// Server: run the circuit over the uploaded inputs.
    Evaluate {
        #[command(flatten)]
        instance: Instance,
        #[command(flatten)]
        circuit: CircuitArgs,
    },
    /// Client: decrypt results and write one label per item.
    Decrypt {
        #[command(flatten)]
        instance: Instance,
        /// Only report how many results are available.
        #[arg(long)]
        count_only: bool,
    },
    /// Run the whole chain in one process and write the accuracy report.
    Quality {
        #[command(flatten)]
        instance: Instance,
        #[command(flatten)]
        dataset: DatasetArgs,
        #[command(flatten)]
        circuit: CircuitArgs,
    },
    /// Compare written labels against ground truth and write the accuracy report.
    Score {
        #[command(flatten)]
        instance: Instance,
        /// Defaults to datasets/<tier>/dataset_labels.txt.
        #[arg(long)]
        labels: Option<PathBuf>,
    },
}

fn parse_size(s: &str) -> Result<InstanceSize, String> {
    s.parse().map_err(|e: heathcliff_infer::Error| e.to_string())
}

impl Instance {
    fn params(&self, root: &Path) -> anyhow::Result<InstanceParams> {
        let params = InstanceParams::new(self.size, root);
        Ok(match self.count {
            Some(count) => params.with_batch_size(count)?,
            None => params,
        })
    }
}

impl DatasetArgs {
    fn load(&self, params: &InstanceParams) -> anyhow::Result<Vec<Sample>> {
        let mode = if self.strict {LoadMode::Strict} else {LoadMode::Lenient};
        let loader = DatasetLoader::new(params.dimensions()).with_mode(mode);
        let samples = match (&self.pixels, &self.labels) {
            (Some(pixels), Some(labels)) => loader.load_split(labels, pixels)?,
            _ => {
                let path = self.dataset.clone()
                    .unwrap_or_else(|| params.dir(DirectoryRoot::Data).join("dataset.txt"));
                loader.load(&path).with_context(|| format!("loading {}", path.display()))?
            }
        };
        tracing::info!(samples = samples.len(), "loaded dataset");
        Ok(samples)
    }
}

impl CircuitArgs {
    fn build(&self, context: &std::sync::Arc<HeContext>) -> anyhow::Result<Box<dyn CircuitEvaluator>> {
        Ok(match &self.bias {
            Some(bias) => Box::new(BiasCircuit::new(context.clone(), bias)?),
            None => Box::new(IdentityCircuit),
        })
    }
}

fn open(cli: &Cli, params: InstanceParams) -> anyhow::Result<BatchOrchestrator<FsArtifactStore>> {
    let store = FsArtifactStore::new(params.roots().clone());
    Ok(BatchOrchestrator::open(params, store)?.with_max_in_flight(cli.max_in_flight)?)
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    match &cli.command {
        Command::Keygen { instance } => {
            let params = instance.params(&cli.root)?;
            let store = FsArtifactStore::new(params.roots().clone());
            let context = HeContext::new(EncryptionParameters::inference_default())?;
            BatchOrchestrator::new(params, context, store)?.keygen()?;
        }
        Command::Encrypt { instance, dataset, count_only } => {
            let params = instance.params(&cli.root)?;
            let samples = dataset.load(&params)?;
            if *count_only {
                println!("{}", samples.len().min(params.batch_size()));
                return Ok(());
            }
            let count = open(cli, params)?.encrypt_inputs(&samples)?;
            tracing::info!(count, "encrypted inputs");
        }
        Command::Evaluate { instance, circuit } => {
            let orchestrator = open(cli, instance.params(&cli.root)?)?;
            let circuit = circuit.build(orchestrator.context())?;
            let count = orchestrator.evaluate(circuit.as_ref())?;
            tracing::info!(count, "evaluated inputs");
        }
        Command::Decrypt { instance, count_only } => {
            let params = instance.params(&cli.root)?;
            if *count_only {
                let store = FsArtifactStore::new(params.roots().clone());
                let available = (0..params.batch_size())
                    .filter(|i| store.contains(DirectoryRoot::CiphertextDown, ArtifactKind::CipherResult, params.artifact_index(*i)))
                    .count();
                println!("{}", available);
                return Ok(());
            }
            let labels = open(cli, params)?.decrypt_results()?;
            tracing::info!(count = labels.len(), "wrote labels");
        }
        Command::Quality { instance, dataset, circuit } => {
            let params = instance.params(&cli.root)?;
            let samples = dataset.load(&params)?;
            let orchestrator = open(cli, params)?;
            let circuit = circuit.build(orchestrator.context())?;
            let report = orchestrator.quality(&samples, circuit.as_ref())?;
            print!("{}", report.render());
        }
        Command::Score { instance, labels } => {
            let params = instance.params(&cli.root)?;
            let path = labels.clone()
                .unwrap_or_else(|| params.dir(DirectoryRoot::Data).join("dataset_labels.txt"));
            let labels = read_labels(&path).with_context(|| format!("reading {}", path.display()))?;
            let report = open(cli, params)?.score_predictions(&labels)?;
            print!("{}", report.render());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    // Usage errors exit with success, as the stage binaries always have.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_tier() {
        let cli = Cli::try_parse_from(["heathcliff-infer", "encrypt", "1", "--count", "3", "--strict"]).unwrap();
        match cli.command {
            Command::Encrypt { instance, dataset, count_only } => {
                assert_eq!(InstanceSize::Small, instance.size);
                assert_eq!(Some(3), instance.count);
                assert!(dataset.strict);
                assert!(!count_only);
            }
            _ => panic!("wrong command"),
        }
        assert!(Cli::try_parse_from(["heathcliff-infer", "decrypt", "7"]).is_err());
        assert!(Cli::try_parse_from(["heathcliff-infer", "decrypt", "x"]).is_err());
        assert!(Cli::try_parse_from(["heathcliff-infer", "decrypt"]).is_err());
    }

    #[test]
    fn test_bias_list() {
        let cli = Cli::try_parse_from(["heathcliff-infer", "evaluate", "0", "--bias", "0.5,-1"]).unwrap();
        match cli.command {
            Command::Evaluate { circuit, .. } => assert_eq!(Some(vec![0.5, -1.0]), circuit.bias),
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_stages_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let data = root.join("datasets/small");
        std::fs::create_dir_all(&data).unwrap();
        let mut text = String::new();
        for label in 0..2 {
            let pixels: Vec<String> = (0..784).map(|j| if j == label { "1".into() } else { "0".into() }).collect();
            text.push_str(&format!("{} {}\n", label, pixels.join(" ")));
        }
        std::fs::write(data.join("dataset.txt"), text).unwrap();
        std::fs::write(data.join("dataset_labels.txt"), "0\n1\n").unwrap();

        let stage = |args: &[&str]| {
            let mut argv = vec!["heathcliff-infer", "--root", root.to_str().unwrap()];
            argv.extend_from_slice(args);
            run(&Cli::try_parse_from(argv).unwrap()).unwrap();
        };
        stage(&["keygen", "1"]);
        stage(&["encrypt", "1", "--count", "2"]);
        stage(&["evaluate", "1", "--count", "2"]);
        stage(&["decrypt", "1", "--count", "2"]);
        stage(&["score", "1", "--count", "2"]);

        let io = root.join("io/small");
        assert_eq!("0\n", std::fs::read_to_string(io.join("result_0.txt")).unwrap());
        assert_eq!("1\n", std::fs::read_to_string(io.join("result_1.txt")).unwrap());
        assert_eq!("batch_size: 2\naccuracy: 1\n", std::fs::read_to_string(io.join("quality.txt")).unwrap());
        assert!(io.join("secret_key/sk.bin").is_file());
        assert!(io.join("ciphertexts_upload/cipher_input_1.bin").is_file());
    }
}
