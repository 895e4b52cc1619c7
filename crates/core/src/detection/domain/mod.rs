pub mod face_landmarks;
pub mod landmark_detector;
pub mod orientation_classifier;
