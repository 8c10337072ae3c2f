mod bills;
mod groups;
mod locations;
mod members;
mod posts;
mod reports;
mod users;
