mod algorithms;
mod helpers;
mod iteration;
mod jobs;
mod worker;
