mod cache_test;
mod expand_test;
mod propagation_test;
mod refresh_test;
