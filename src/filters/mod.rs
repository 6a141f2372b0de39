pub mod ekf;
