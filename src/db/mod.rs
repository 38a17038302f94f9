pub mod dbsessions;
