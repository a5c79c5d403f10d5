mod dashboards;
mod thumbnails;
