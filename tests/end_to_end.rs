mod common;

use formsift::html::parse_form;
use formsift::{
    AnnotationFilter, ClassifierConfig, EvaluationConfig, FieldModelConfig, FormAnnotation,
    FormFieldClassifier, FormModelConfig, FormTypeClassifier, TrainingPolicy, artifact,
    conditioning_form_labels, evaluate_field_types, evaluate_form_types, field_conditioning,
    out_of_fold_form_labels, train_field_labeler,
};

use common::{LOGIN_PAGE, MISLABELED_URL, build_corpus, build_corpus_with_mislabeled_search};

fn trained(n_domains: usize) -> (tempfile::TempDir, FormFieldClassifier) {
    let (dir, storage) = build_corpus(n_domains);
    let classifier = FormFieldClassifier::trained_on(&storage, &ClassifierConfig::default()).unwrap();
    (dir, classifier)
}

#[test]
fn login_page_is_classified_with_its_fields() {
    let (_dir, classifier) = trained(12);
    let extracted = classifier.extract_forms_proba(LOGIN_PAGE, 0.0).unwrap();
    assert_eq!(extracted.len(), 1);
    let probs = &extracted[0].1;
    let login = probs.form["login"];
    assert!(login > 0.5, "login probability {login}");
    assert!(probs.form.iter().all(|(label, p)| label == "login" || *p < login));

    let classified = classifier.extract_forms(LOGIN_PAGE).unwrap();
    let result = &classified[0].1;
    assert_eq!(result.form, "login");
    assert_eq!(result.fields.len(), 2);
    assert_eq!(result.fields["username"], "username");
    assert_eq!(result.fields["password"], "password");
}

#[test]
fn learned_classes_are_the_observed_ones() {
    let (_dir, classifier) = trained(6);
    assert_eq!(
        classifier.form_classes().unwrap(),
        &["contact/comment", "login", "registration", "search"]
    );
    let fields = classifier.field_classes().unwrap();
    assert!(fields.contains(&"search query".to_string()));
    assert!(!fields.iter().any(|label| label == "NOT ANNOTATED"));
}

#[test]
fn thresholded_distribution_can_be_empty() {
    let (_dir, classifier) = trained(6);
    let form = parse_form(LOGIN_PAGE).unwrap();
    let result = classifier.classify_proba(&form, 1.01).unwrap();
    assert!(result.form.is_empty());
    assert!(result.fields.values().all(|probs| probs.is_empty()));
    let no_fields = parse_form("<form><input type=hidden name=t></form>").unwrap();
    assert!(classifier.classify(&no_fields).unwrap().fields.is_empty());
}

#[test]
fn saved_bundle_predicts_identically() {
    let (dir, classifier) = trained(6);
    let path = dir.path().join("models").join("formsift.bin");
    artifact::save(&classifier, &path).unwrap();
    let restored = artifact::load(&path).unwrap();
    assert_eq!(restored, classifier);
    assert_eq!(
        restored.extract_forms(LOGIN_PAGE).unwrap(),
        classifier.extract_forms(LOGIN_PAGE).unwrap()
    );
}

#[test]
fn training_is_reproducible() {
    let (_dir, storage) = build_corpus(5);
    let annotations = storage.annotations(&AnnotationFilter::default()).unwrap();
    let config = ClassifierConfig::default();
    let a = FormTypeClassifier::train_on(&annotations, &config.form).unwrap();
    let b = FormTypeClassifier::train_on(&annotations, &config.form).unwrap();
    assert_eq!(a, b);
}

#[test]
fn out_of_fold_labels_cover_every_form() {
    let (_dir, storage) = build_corpus(8);
    let annotations = storage.annotations(&AnnotationFilter::default()).unwrap();
    let config = EvaluationConfig::default();
    let labels = out_of_fold_form_labels(&annotations, 4, 0, &config.form).unwrap();
    assert_eq!(labels.len(), annotations.len());
    let known = ["contact/comment", "login", "registration", "search"];
    assert!(labels.iter().all(|label| known.contains(&label.as_str())));
}

#[test]
fn cross_validation_reports_in_schema_order() {
    let (_dir, storage) = build_corpus(8);
    let annotations = storage.annotations(&AnnotationFilter::default()).unwrap();
    let config = EvaluationConfig::default().with_folds(4);

    let forms = evaluate_form_types(&annotations, &config).unwrap();
    let order: Vec<&str> = forms.report.classes.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(order, vec!["search", "login", "registration", "contact/comment"]);
    assert_eq!(forms.confusion.labels.len(), 4);
    assert!(forms.report.accuracy >= 0.75, "{}", forms.report);

    let fields = evaluate_field_types(&annotations, &config).unwrap();
    assert_eq!(fields.n_sequences, annotations.len());
    assert!(fields.field_accuracy > 0.5, "{fields}");
}

fn mislabeled_annotations(n_domains: usize) -> (tempfile::TempDir, Vec<FormAnnotation>, usize) {
    let (dir, storage) = build_corpus_with_mislabeled_search(n_domains);
    let annotations = storage.annotations(&AnnotationFilter::default()).unwrap();
    let odd = annotations
        .iter()
        .position(|a| a.url() == MISLABELED_URL)
        .unwrap();
    assert_eq!(annotations[odd].form_type_full().unwrap(), "login");
    (dir, annotations, odd)
}

#[test]
fn realistic_policy_trains_on_predicted_form_types() {
    let (_dir, annotations, odd) = mislabeled_annotations(8);
    let form_config = FormModelConfig::default();
    let realistic = FieldModelConfig::default()
        .with_policy(TrainingPolicy::Realistic)
        .with_realistic_folds(4);
    let precise = realistic.clone().with_policy(TrainingPolicy::Precise);

    let predicted = out_of_fold_form_labels(&annotations, 4, realistic.seed, &form_config).unwrap();
    assert_eq!(predicted[odd], "search");

    let conditioned = conditioning_form_labels(&annotations, &realistic, &form_config).unwrap();
    assert_eq!(conditioned, predicted);
    let truth = conditioning_form_labels(&annotations, &precise, &form_config).unwrap();
    assert_eq!(truth[odd], "login");
    assert!(
        truth
            .iter()
            .zip(&annotations)
            .all(|(label, a)| *label == a.form_type_full().unwrap())
    );

    let realistic_labeler = train_field_labeler(&annotations, &realistic, &form_config).unwrap();
    let precise_labeler = train_field_labeler(&annotations, &precise, &form_config).unwrap();
    assert_ne!(realistic_labeler, precise_labeler);

    let config = ClassifierConfig {
        field: realistic,
        ..ClassifierConfig::default()
    };
    let classifier = FormFieldClassifier::train(&annotations, &config).unwrap();
    let form = parse_form(LOGIN_PAGE).unwrap();
    assert_eq!(classifier.classify(&form).unwrap().fields.len(), 2);
}

#[test]
fn field_cross_validation_tests_on_predicted_form_types() {
    let (_dir, annotations, odd) = mislabeled_annotations(8);
    let precise = EvaluationConfig::default().with_folds(4);
    let predicted =
        out_of_fold_form_labels(&annotations, precise.n_folds, precise.seed, &precise.form).unwrap();
    assert_eq!(predicted[odd], "search");

    let conditioning = field_conditioning(&annotations, &precise).unwrap();
    assert_eq!(conditioning.testing, predicted);
    assert_eq!(conditioning.training[odd], "login");

    let realistic = EvaluationConfig {
        field: precise.field.clone().with_policy(TrainingPolicy::Realistic),
        ..precise.clone()
    };
    let conditioning = field_conditioning(&annotations, &realistic).unwrap();
    assert_eq!(conditioning.training, predicted);
    assert_eq!(conditioning.testing, predicted);
}
