use crate::server::ServerRouter;

mod feed;
mod health;
mod posts;
mod users;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(posts::routes())
        .merge(feed::routes())
        .merge(users::routes())
        .merge(health::routes())
}
