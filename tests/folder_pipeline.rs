use std::fs;
use std::path::Path;
use std::sync::Arc;

use image::{GrayImage, Luma, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::SeedableRng;

use mshnet::data::{Batch, Benchmark, DataLoader, EpisodeSource, FolderDataset, Split};
use mshnet::eval::{AverageMeter, Evaluator};
use mshnet::logging::RunLogger;
use mshnet::loss::IGNORE_INDEX;
use mshnet::optim::LR_GAMMA;
use mshnet::{Backbone, CheckpointDir, Error, ExponentialLr, MshNet, SegmentationModel, SeedControl, Sgd, Trainer};

const SIZE: u32 = 8;

/// A square at `offset` on a dark background, with a mask whose corner
/// pixel is a boundary value.
fn write_pair(dir: &Path, stem: &str, offset: u32) {
    let inside = |x: u32, y: u32| (offset..offset + 4).contains(&x) && (offset..offset + 4).contains(&y);
    let img = RgbImage::from_fn(SIZE, SIZE, |x, y| {
        if inside(x, y) { Rgb([230, 200, 40]) } else { Rgb([20, 20, 30]) }
    });
    let mask = GrayImage::from_fn(SIZE, SIZE, |x, y| {
        if x == SIZE - 1 && y == SIZE - 1 {
            Luma([128])
        } else if inside(x, y) {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    img.save(dir.join(format!("{stem}.png"))).unwrap();
    mask.save(dir.join(format!("{stem}_mask.png"))).unwrap();
}

fn write_class(root: &Path, benchmark: &str, class_id: usize, count: u32) {
    let dir = root.join(benchmark).join(class_id.to_string());
    fs::create_dir_all(&dir).unwrap();
    for i in 0..count {
        write_pair(&dir, &format!("img{i}"), i % 4);
    }
}

#[test]
fn folder_episodes_follow_the_fold_partition() {
    let tmp = tempfile::tempdir().unwrap();
    write_class(tmp.path(), "pascal", 0, 3);
    for class_id in 1..5 {
        write_class(tmp.path(), "pascal", class_id, 2);
    }

    let val = FolderDataset::new(tmp.path(), Benchmark::Pascal, 0, Split::Val, 1, SIZE).unwrap();
    assert_eq!(val.class_ids(), &[0, 1, 2, 3, 4]);
    assert_eq!(val.len(), 11);

    let ep = val.episode(0, &mut StdRng::seed_from_u64(1)).unwrap();
    assert_eq!(ep.class_id, 0);
    assert_eq!(ep.support_imgs.len(), 1);
    assert_eq!(ep.query_img.height, SIZE as usize);
    assert_eq!(ep.query_mask.labels[0], 1);
    assert_eq!(ep.query_mask.labels[(SIZE * SIZE - 1) as usize], IGNORE_INDEX);
    assert_eq!(ep.query_mask.foreground_count(), 16);
    assert_ne!(ep.support_imgs[0], ep.query_img);
}

#[test]
fn missing_class_directory_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write_class(tmp.path(), "pascal", 0, 2);
    write_class(tmp.path(), "pascal", 2, 2);
    // Training class under fold 0, does not stand in for validation classes.
    write_class(tmp.path(), "pascal", 7, 2);

    match FolderDataset::new(tmp.path(), Benchmark::Pascal, 0, Split::Val, 1, SIZE) {
        Err(Error::Dataset(msg)) => assert!(msg.contains("class 1"), "{msg}"),
        Err(other) => panic!("unexpected error {other}"),
        Ok(ds) => panic!("served {:?} with classes missing on disk", ds.class_ids()),
    }

    let trn = FolderDataset::new(tmp.path(), Benchmark::Pascal, 0, Split::Trn, 1, SIZE);
    assert!(matches!(trn, Err(Error::Dataset(_))));
}

#[test]
fn perfect_predictions_score_full_miou_over_served_classes() {
    let tmp = tempfile::tempdir().unwrap();
    for class_id in 0..5 {
        write_class(tmp.path(), "pascal", class_id, 2);
    }
    let val = FolderDataset::new(tmp.path(), Benchmark::Pascal, 0, Split::Val, 1, SIZE).unwrap();
    let mut meter = AverageMeter::new(&val);
    let mut rng = StdRng::seed_from_u64(0);

    for idx in 0..val.len() {
        let batch = Batch::collate(vec![val.episode(idx, &mut rng).unwrap()]);
        let pred: Vec<usize> = batch.query_mask[0].labels.iter().map(|&l| (l == 1) as usize).collect();
        let areas = Evaluator::classify_prediction(&[pred], &batch).unwrap();
        meter.update(&areas, &batch.class_id, 0.0).unwrap();
    }

    let (miou, fb_iou) = meter.compute_iou();
    assert!((miou - 100.0).abs() < 1e-9, "mIoU {miou}");
    assert!((fb_iou - 100.0).abs() < 1e-9, "FB-IoU {fb_iou}");
}

#[test]
fn too_few_images_for_the_shot_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    for class_id in 0..5 {
        write_class(tmp.path(), "pascal", class_id, 2);
    }
    let err = FolderDataset::new(tmp.path(), Benchmark::Pascal, 0, Split::Val, 2, SIZE);
    assert!(matches!(err, Err(Error::Dataset(msg)) if msg.contains("2 images")));
}

#[test]
fn mshnet_trains_from_disk_and_resumes() {
    let tmp = tempfile::tempdir().unwrap();
    let data = tmp.path().join("data");
    for class_id in 0..20 {
        write_class(&data, "pascal", class_id, 2);
    }

    let run = |niter: usize| {
        let trn = FolderDataset::new(&data, Benchmark::Pascal, 0, Split::Trn, 1, SIZE).unwrap();
        let val = FolderDataset::new(&data, Benchmark::Pascal, 0, Split::Val, 1, SIZE).unwrap();
        let mut model = MshNet::new(Backbone::Vgg16, 1, &mut StdRng::seed_from_u64(9));
        let n_params = model.trainable_params().len();
        let optimizer = Sgd::new(0.025, 0.9, 0.00005, n_params);
        let scheduler = ExponentialLr::new(&optimizer, LR_GAMMA);
        let logger = RunLogger::initialize(tmp.path().join("logs/disk.log")).unwrap();
        let mut trainer = Trainer::new(
            model,
            optimizer,
            scheduler,
            DataLoader::new(Arc::new(trn), 4, 2, true),
            DataLoader::new(Arc::new(val), 4, 2, false),
            CheckpointDir::new(tmp.path().join("resume")),
            logger,
            niter,
        )
        .with_seeds(SeedControl::with_training_seed(5));
        let report = trainer.run().unwrap();
        (report, trainer.into_model().state_dict())
    };

    let (first, _) = run(2);
    assert_eq!(first.history.len(), 2);
    assert!(first.history.iter().all(|s| s.train.loss.is_finite() && s.val.loss.is_finite()));
    let bundle = CheckpointDir::new(tmp.path().join("resume")).load_resume().unwrap();
    assert_eq!(bundle.epoch, 1);

    let (second, state) = run(3);
    assert_eq!(second.start_epoch, 1);
    assert_eq!(second.history.len(), 2);
    assert_eq!(state.len(), bundle.state_dict.len());
}
