use nalgebra::*;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use rand_distr::Normal;
use discrim::*;
use discrim::api::{Sessions, TrainRequest, Points, Label, Params};
use discrim::calc::cov::{CovarianceConfig, CovType, Centering, Scaling};
use discrim::model::Transform;

/// Draws n observations per class from isotropic normals around the informed means.
fn gaussian_classes(rng : &mut StdRng, means : &[(f64, f64)], sd : f64, n : usize) -> Dataset {
    let noise = Normal::new(0.0, sd).unwrap();
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for (k, (mx, my)) in means.iter().enumerate() {
        for _ in 0..n {
            rows.push(vec![mx + rng.sample(noise), my + rng.sample(noise)]);
            labels.push(k as i64);
        }
    }
    Dataset::from_rows(&rows[..], labels).unwrap()
}

#[test]
fn separated_classes_are_recovered() {
    let mut rng = StdRng::seed_from_u64(19);
    let means = [(1.0, 1.0), (-1.0, -1.0)];
    let train = gaussian_classes(&mut rng, &means, 0.1, 500);
    let test = gaussian_classes(&mut rng, &means, 0.1, 100);
    let cfg = TrainConfig {
        prior : PriorPolicy::MaximumLikelihood,
        covariance : CovarianceConfig { ctype : CovType::Full, center : Centering::Untied, scale : Scaling::Biased },
        n_components : Some(2)
    };
    for alg in Algorithm::ALL.iter() {
        let mut clf = Classifier::new(*alg);
        clf.train(&train, &cfg).unwrap();
        let eval = clf.score(&test).unwrap();
        assert!(eval.metrics.accuracy >= 0.95, "{} reached {}", alg, eval.metrics.accuracy);
        assert_eq!(eval.confusion.total(), 200);
    }
}

#[test]
fn fisher_needs_two_classes() {
    let mut rng = StdRng::seed_from_u64(3);
    let single = gaussian_classes(&mut rng, &[(0.0, 0.0)], 1.0, 50);
    for alg in [Algorithm::FisherPooled, Algorithm::FisherClassDependent].iter() {
        let err = alg.train(&single, &TrainConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "COMPONENT_RANGE");
    }
}

#[test]
fn identical_classes_decide_near_chance() {
    let mut rng = StdRng::seed_from_u64(7);
    let means = [(0.0, 0.0), (0.0, 0.0)];
    let train = gaussian_classes(&mut rng, &means, 1.0, 500);
    let test = gaussian_classes(&mut rng, &means, 1.0, 500);
    for alg in [Algorithm::Pooled, Algorithm::ClassDependent].iter() {
        let model = alg.train(&train, &TrainConfig::default()).unwrap();
        let acc = alg.score(&model, &test).unwrap().metrics.accuracy;
        assert!(acc > 0.35 && acc < 0.65, "{} reached {}", alg, acc);

        // Mean distance to the class mean is sqrt(pi / 2) sd in two dimensions; the
        // score sums it over classes with weight 1/2 each and divides by all N observations.
        let expected = (std::f64::consts::PI / 2.0).sqrt() / 2.0;
        assert!((model.fit_score() - expected).abs() < 0.05, "{} fit score {}", alg, model.fit_score());
    }
}

#[test]
fn training_is_deterministic() {
    let mut rng = StdRng::seed_from_u64(11);
    let data = gaussian_classes(&mut rng, &[(0.0, 0.0), (3.0, 1.0), (1.0, 4.0)], 0.8, 60);
    let cfg = TrainConfig { prior : PriorPolicy::FrequencyWeighted, ..TrainConfig::default() };
    for alg in Algorithm::ALL.iter() {
        let first = alg.train(&data, &cfg).unwrap();
        let second = alg.train(&data, &cfg).unwrap();
        assert_eq!(first, second);
        assert_eq!(alg.predict(&first, data.features()).unwrap(), alg.predict(&second, data.features()).unwrap());
    }
}

#[test]
fn fisher_keeps_one_axis_less_than_classes() {
    let mut rng = StdRng::seed_from_u64(5);
    let data = gaussian_classes(&mut rng, &[(0.0, 0.0), (4.0, 0.0), (0.0, 4.0)], 1.0, 40);
    let model = Algorithm::FisherPooled.train(&data, &TrainConfig::default()).unwrap();
    assert_eq!(model.transform().ncols(), 2);
    let two = Dataset::from_rows(
        &data.features().row_iter().take(80).map(|r| r.iter().copied().collect() ).collect::<Vec<Vec<f64>>>()[..],
        data.labels()[..80].to_vec()
    ).unwrap();
    let model = Algorithm::FisherClassDependent.train(&two, &TrainConfig::default()).unwrap();
    match model.transform() {
        Transform::PerClass(ts) => assert!(ts.iter().all(|t| t.shape() == (2, 1) )),
        Transform::Shared(_) => panic!("expected per-class transforms")
    }
}

#[test]
fn posteriors_are_distributions() {
    let mut rng = StdRng::seed_from_u64(23);
    let data = gaussian_classes(&mut rng, &[(0.0, 0.0), (2.0, 2.0)], 1.0, 100);
    let model = Algorithm::ClassDependent.train(&data, &TrainConfig::default()).unwrap();
    // Includes a point far from both classes.
    let x = DMatrix::from_row_slice(3, 2, &[0.0, 0.0, 2.0, 2.0, 1E4, -1E4]);
    let decision = Algorithm::ClassDependent.predict(&model, &x).unwrap();
    for row in decision.posteriors.row_iter() {
        assert!(row.iter().all(|p| p.is_finite() && *p >= 0.0 ));
        assert!((row.sum() - 1.0).abs() < 1E-9);
    }
    assert_eq!(decision.labels[..2].to_vec(), vec![0, 1]);
}

#[test]
fn restored_model_decides_identically() {
    let mut rng = StdRng::seed_from_u64(31);
    let data = gaussian_classes(&mut rng, &[(0.0, 0.0), (2.0, 0.0), (1.0, 2.0)], 0.7, 50);
    for alg in Algorithm::ALL.iter() {
        let model = alg.train(&data, &TrainConfig::default()).unwrap();
        let restored = TrainedModel::from_bytes(&model.to_bytes().unwrap()[..]).unwrap();
        assert_eq!(model, restored);
        let mut clf = Classifier::new(*alg);
        clf.restore(restored).unwrap();
        assert_eq!(clf.predict(data.features()).unwrap(), alg.predict(&model, data.features()).unwrap());
    }
}

#[test]
fn sessions_flow() {
    let mut rng = StdRng::seed_from_u64(43);
    let data = gaussian_classes(&mut rng, &[(-2.0, 0.0), (2.0, 0.0)], 0.5, 30);
    let names = ["left", "right"];
    let request = TrainRequest {
        algorithm : "lda".into(),
        points : Points {
            x : data.features().column(0).iter().copied().collect(),
            y : data.features().column(1).iter().copied().collect()
        },
        labels : data.labels().iter().map(|l| Label::Text(names[*l as usize].into()) ).collect(),
        params : Params { scale : Some("empirical".into()), ..Params::default() }
    };
    let sessions = Sessions::new();
    let resp = sessions.train("s1", &request).unwrap();
    assert_eq!(resp.algorithm, Algorithm::FisherPooled);
    let pred = sessions.predict("s1", &Points { x : vec![-2.0, 2.0], y : vec![0.0, 0.0] }).unwrap();
    assert_eq!(pred.labels, vec![Label::Text("left".into()), Label::Text("right".into())]);
    let err = sessions.predict("s2", &Points::default()).unwrap_err();
    assert_eq!(err.kind(), "MODEL_NOT_TRAINED");
}
