mod community;
mod pets;
mod schedule;
mod users;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(users::register))
        .route("/users/login", post(users::login))
        .route("/users/check-email", get(users::check_email))
        .route("/users/profile", get(users::profile).patch(users::update_profile))
        .route("/users/profile/image", patch(users::upload_image))
        .route("/users/posts", get(community::my_posts))
        .route("/users/comments", get(community::my_comments))
        .route("/users/pets", get(pets::list).post(pets::create))
        .route("/users/pets/{id}", patch(pets::update).delete(pets::delete))
        .route("/records/category", post(pets::create_record))
        .route("/records/{id}", axum::routing::delete(pets::delete_record))
        .route("/records/graph/{id}", get(pets::graph_history).post(pets::add_graph_data))
        .route(
            "/records/graph/{id}/{data_id}",
            patch(pets::update_graph_data).delete(pets::delete_graph_data),
        )
        .route("/records/photo/{id}", get(pets::photo_history))
        .route("/todolists", post(schedule::create_todo))
        .route("/todolists/user/{user_id}", get(schedule::list_todos))
        .route(
            "/todolists/{id}",
            get(schedule::get_todo)
                .put(schedule::update_todo)
                .delete(schedule::delete_todo),
        )
        .route("/todolists/{id}/complete", patch(schedule::complete_todo))
        .route("/events", get(schedule::list_events).post(schedule::create_event))
        .route("/events/events/{range}", get(schedule::event_range))
        .route(
            "/events/{id}",
            get(schedule::get_event)
                .put(schedule::update_event)
                .delete(schedule::delete_event),
        )
        .route("/community/posts", get(community::list_posts).post(community::create_post))
        .route("/community/auth/user", get(community::current_user))
        .route(
            "/community/{post_id}",
            get(community::get_post)
                .patch(community::update_post)
                .delete(community::delete_post),
        )
        .route(
            "/community/{post_id}/comments",
            get(community::list_comments).post(community::add_comment),
        )
        .route(
            "/community/{post_id}/comments/{id}",
            patch(community::edit_comment).delete(community::delete_comment),
        )
}
