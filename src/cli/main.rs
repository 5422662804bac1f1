use anyhow::{anyhow, bail, Context};
use discrim::api::Params;
use discrim::fit::{Algorithm, Classifier};
use discrim::model::TrainedModel;
use discrim::sample::Dataset;
use nalgebra::*;
use serde_json::json;
use structopt::StructOpt;
use tracing::Level;

/// Train and apply Gaussian discriminant classifiers from the command line
#[derive(StructOpt, Debug)]
#[structopt(name = "discrim")]
pub struct Discrim {

    /// Log training and scoring progress to stderr
    #[structopt(short, long, global = true)]
    verbose : bool,

    /// Input CSV files carry a header row
    #[structopt(long, global = true)]
    header : bool,

    #[structopt(subcommand)]
    cmd : Command

}

#[derive(StructOpt, Debug)]
pub enum Command {

    /// Trains a classifier over a CSV file of feature columns followed by an integer
    /// label column, saving the model as JSON.
    Train {

        #[structopt(short, long)]
        data : String,

        /// pca | qda | lda | qlda (or pooled, class_dependent, fisher_pooled, fisher_class_dependent)
        #[structopt(short, long)]
        algorithm : String,

        /// ml | map
        #[structopt(long)]
        prior : Option<String>,

        /// full | diagonal
        #[structopt(long)]
        ctype : Option<String>,

        /// none | tied | untied
        #[structopt(long)]
        center : Option<String>,

        /// none | biased | unbiased | empirical
        #[structopt(long)]
        scale : Option<String>,

        #[structopt(short, long)]
        n_components : Option<usize>,

        #[structopt(short, long)]
        output : Option<String>
    },

    /// Scores a saved model against a labelled CSV file.
    Evaluate {

        #[structopt(short, long)]
        model : String,

        #[structopt(short, long)]
        data : String
    },

    /// Classifies the rows of a CSV file; a trailing label column, if present, is ignored.
    Predict {

        #[structopt(short, long)]
        model : String,

        #[structopt(short, long)]
        data : String
    }

}

fn read_rows(path : &str, header : bool) -> anyhow::Result<Vec<Vec<f64>>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(header)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Error opening table {}", path))?;
    let mut rows = Vec::new();
    for (ix, record) in rdr.records().enumerate() {
        let record = record?;
        let row = record.iter()
            .map(|field| field.parse::<f64>() )
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Non-numeric field at row {} of {}", ix + 1, path))?;
        rows.push(row);
    }
    if rows.is_empty() {
        bail!("Table {} has no rows", path);
    }
    Ok(rows)
}

/// Splits rows into features and the trailing integer label column.
fn labelled(rows : &[Vec<f64>]) -> anyhow::Result<Dataset> {
    let mut features = Vec::with_capacity(rows.len());
    let mut labels = Vec::with_capacity(rows.len());
    for row in rows {
        let (label, x) = row.split_last().ok_or_else(|| anyhow!("Empty row"))?;
        if label.fract() != 0.0 {
            bail!("Label {} is not an integer", label);
        }
        features.push(x.to_vec());
        labels.push(*label as i64);
    }
    Ok(Dataset::from_rows(&features[..], labels)?)
}

fn unlabelled(rows : &[Vec<f64>], dim : usize) -> anyhow::Result<DMatrix<f64>> {
    let width = rows[0].len();
    if width != dim && width != dim + 1 {
        bail!("Table has {} columns, but the model expects {} features", width, dim);
    }
    let mut x = DMatrix::zeros(rows.len(), dim);
    for (i, row) in rows.iter().enumerate() {
        if row.len() != width {
            bail!("Row {} has {} columns, expected {}", i + 1, row.len(), width);
        }
        x.row_mut(i).copy_from_slice(&row[..dim]);
    }
    Ok(x)
}

fn main() -> anyhow::Result<()> {
    let args = Discrim::from_args();
    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    match args.cmd {
        Command::Train { data, algorithm, prior, ctype, center, scale, n_components, output } => {
            let algorithm : Algorithm = algorithm.parse()?;
            let config = Params { prior, ctype, center, scale, n_components }.config()?;
            let dataset = labelled(&read_rows(&data, args.header)?[..])?;
            let mut clf = Classifier::new(algorithm);
            let model = clf.train(&dataset, &config)?;
            match output {
                Some(path) => {
                    model.save_to_path(&path)?;
                    println!("{}", json!({ "algorithm" : algorithm, "fit_score" : model.fit_score(), "classes" : model.labels(), "output" : path }));
                },
                None => println!("{}", String::from_utf8(model.to_bytes()?)?)
            }
        },
        Command::Evaluate { model, data } => {
            let model = TrainedModel::load_from_path(&model)?;
            let dataset = labelled(&read_rows(&data, args.header)?[..])?;
            let eval = model.algorithm().score(&model, &dataset)?;
            println!("{}", serde_json::to_string_pretty(&eval)?);
        },
        Command::Predict { model, data } => {
            let model = TrainedModel::load_from_path(&model)?;
            let x = unlabelled(&read_rows(&data, args.header)?[..], model.dim())?;
            let decision = model.algorithm().predict(&model, &x)?;
            let posteriors : Vec<Vec<f64>> = decision.posteriors.row_iter()
                .map(|row| row.iter().copied().collect() )
                .collect();
            println!("{}", json!({ "labels" : decision.labels, "posteriors" : posteriors }));
        }
    }
    Ok(())
}
