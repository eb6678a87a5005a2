pub mod audio;
pub mod dsp;
pub mod gain;
pub mod mixer;
pub mod resample;
