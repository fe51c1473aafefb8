mod routes;
mod support;
